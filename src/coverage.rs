//! Resolution coverage: which events still lack ground truth, and which
//! resolutions lack provenance.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::merge::{load_jsonl, load_jsonl_lenient};
use crate::types::{EventSpec, ResolutionRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub events: usize,
    pub resolutions: usize,
    /// Event ids with no resolution, in events-file order
    pub missing_resolutions: Vec<String>,
    /// Resolution ids without `verified_source` or `resolved_at`
    pub weak_resolutions: Vec<String>,
    /// Resolution lines that could not be decoded
    pub skipped_resolutions: usize,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.missing_resolutions.is_empty() && self.weak_resolutions.is_empty()
    }
}

pub fn check(events_path: &Path, resolutions_path: &Path) -> Result<CoverageReport> {
    let events = load_jsonl::<EventSpec>(events_path)?;
    let (resolution_rows, skipped) = load_jsonl_lenient::<ResolutionRecord>(resolutions_path)?;

    // Last occurrence wins, but keep first-seen order for reporting
    let mut order: Vec<String> = Vec::new();
    let mut resolutions: HashMap<String, ResolutionRecord> = HashMap::new();
    for row in resolution_rows {
        if !resolutions.contains_key(&row.id) {
            order.push(row.id.clone());
        }
        resolutions.insert(row.id.clone(), row);
    }

    let mut event_ids: Vec<&str> = Vec::new();
    let mut seen_events: HashSet<&str> = HashSet::new();
    for event in &events {
        if seen_events.insert(event.id.as_str()) {
            event_ids.push(event.id.as_str());
        }
    }

    let missing_resolutions: Vec<String> = event_ids
        .iter()
        .filter(|id| !resolutions.contains_key(**id))
        .map(|id| id.to_string())
        .collect();
    let weak_resolutions: Vec<String> = order
        .into_iter()
        .filter(|id| resolutions[id].is_weak())
        .collect();

    let report = CoverageReport {
        events: event_ids.len(),
        resolutions: resolutions.len(),
        missing_resolutions,
        weak_resolutions,
        skipped_resolutions: skipped,
    };
    info!(
        "📋 Coverage: {} events, {} resolutions, {} missing, {} weak",
        report.events,
        report.resolutions,
        report.missing_resolutions.len(),
        report.weak_resolutions.len()
    );
    Ok(report)
}
