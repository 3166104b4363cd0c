//! 🎯 Evaluation run orchestrator
//!
//! Single pass: load and merge the three JSONL sources, score the merged
//! rows, persist a run artifact, return the metrics. Any failure aborts the
//! run; no partial metrics are returned without an artifact on disk.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::{Config, DuplicatePolicy};
use crate::error::Result;
use crate::merge::{self, MergeStats};
use crate::metrics::{self, CalibrationBin, ExcessLogScore, KellyMetrics};
use crate::run_log::RunLog;
use crate::types::ScoredRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loading,
    Merging,
    Scoring,
    Persisting,
    Done,
}

/// Per-event breakdown for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub event_id: String,
    pub question: Option<String>,
    pub predicted_prob: f64,
    pub outcome: u8,
    pub hit: bool,
    pub brier_component: f64,
}

impl Explanation {
    fn from_record(record: &ScoredRecord) -> Self {
        Self {
            event_id: record.event_id.clone(),
            question: record.question.clone(),
            predicted_prob: record.probability,
            outcome: record.outcome,
            hit: metrics::is_hit(record),
            brier_component: metrics::brier_component(record),
        }
    }
}

/// Everything written to `metrics.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub events: usize,
    pub accuracy: f64,
    pub brier: f64,
    #[serde(flatten)]
    pub excess_log: ExcessLogScore,
    #[serde(flatten)]
    pub kelly: KellyMetrics,
    pub calibration: Vec<CalibrationBin>,
    pub summary: String,
    pub explanations: Vec<Explanation>,
}

impl EvaluationMetrics {
    pub fn compute(records: &[ScoredRecord], calibration_bins: usize) -> Self {
        let accuracy = metrics::accuracy(records);
        let brier = metrics::brier_score(records);
        Self {
            events: records.len(),
            accuracy,
            brier,
            excess_log: metrics::excess_log_score(records),
            kelly: metrics::kelly_metrics(records),
            calibration: metrics::calibration_bins(records, calibration_bins),
            summary: summarize(records, accuracy, brier),
            explanations: records.iter().map(Explanation::from_record).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub metrics: EvaluationMetrics,
    pub stats: MergeStats,
    pub run_dir: PathBuf,
}

fn summarize(records: &[ScoredRecord], accuracy: f64, brier: f64) -> String {
    let hits = records.iter().filter(|r| metrics::is_hit(r)).count();
    format!(
        "{}/{} correct ({:.1}%), mean Brier {:.4}",
        hits,
        records.len(),
        accuracy * 100.0,
        brier
    )
}

pub struct Evaluator {
    run_log: RunLog,
    calibration_bins: usize,
    duplicate_policy: DuplicatePolicy,
}

impl Evaluator {
    pub fn new(config: &Config) -> Self {
        Self {
            run_log: RunLog::new(config.run_log.dir.clone()),
            calibration_bins: config.metrics.calibration_bins,
            duplicate_policy: config.merge.duplicate_resolutions,
        }
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    pub fn evaluate(
        &self,
        predictions_path: &Path,
        resolutions_path: &Path,
        events_path: Option<&Path>,
    ) -> Result<EvaluationResult> {
        let mut stage = Stage::Idle;
        let result = self.run(&mut stage, predictions_path, resolutions_path, events_path);
        if let Err(e) = &result {
            error!("❌ Evaluation failed during {:?}: {}", stage, e);
        }
        result
    }

    fn run(
        &self,
        stage: &mut Stage,
        predictions_path: &Path,
        resolutions_path: &Path,
        events_path: Option<&Path>,
    ) -> Result<EvaluationResult> {
        advance(stage, Stage::Loading);
        let inputs = merge::load_inputs(
            predictions_path,
            resolutions_path,
            events_path,
            self.duplicate_policy,
        )?;

        advance(stage, Stage::Merging);
        let merged = inputs.join();

        advance(stage, Stage::Scoring);
        let metrics = EvaluationMetrics::compute(&merged.records, self.calibration_bins);

        advance(stage, Stage::Persisting);
        let run_dir = self.run_log.persist(
            Utc::now(),
            predictions_path,
            resolutions_path,
            events_path,
            &metrics,
            &merged.records,
        )?;

        advance(stage, Stage::Done);
        info!("✅ {}", metrics.summary);
        Ok(EvaluationResult {
            metrics,
            stats: merged.stats,
            run_dir,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("Evaluation stage {:?} -> {:?}", stage, next);
    *stage = next;
}
