use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DuplicatePolicy;
use crate::error::{EvalError, Result};
use crate::parser::{parse_line, Record};
use crate::types::{EventSpec, PredictionRecord, ResolutionRecord, ScoredRecord};

/// Counters describing one join, logged and returned with the result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeStats {
    pub predictions: usize,
    pub resolutions: usize,
    pub events: usize,
    pub merged: usize,
    /// Predictions dropped because their id has no resolution
    pub unresolved: usize,
    /// Merged rows with no event metadata (no market baseline)
    pub without_event: usize,
    pub duplicate_predictions: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub records: Vec<ScoredRecord>,
    pub stats: MergeStats,
}

/// Visit the decode result of every non-blank line of `path` with its
/// 1-based line number. Missing files and read failures abort the walk.
fn for_each_line<R, F>(path: &Path, mut visit: F) -> Result<()>
where
    R: Record,
    F: FnMut(usize, Result<R>) -> Result<()>,
{
    if !path.exists() {
        return Err(EvalError::MissingFile {
            kind: R::KIND,
            path: path.to_path_buf(),
        });
    }

    let io_err = |source| EvalError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;

    // Split on raw bytes so a bad encoding is reported against its line
    for (idx, bytes) in BufReader::new(file).split(b'\n').enumerate() {
        let bytes = bytes.map_err(io_err)?;
        let line_no = idx + 1;
        let decoded = std::str::from_utf8(&bytes)
            .map_err(|source| EvalError::InvalidEncoding {
                path: path.to_path_buf(),
                line: line_no,
                source,
            })
            .and_then(|line| parse_line::<R>(path, line_no, line));
        if let Some(record) = decoded.transpose() {
            visit(line_no, record)?;
        }
    }
    Ok(())
}

/// Visit every record of `path`, failing on the first bad line
fn for_each_record<R, F>(path: &Path, mut visit: F) -> Result<()>
where
    R: Record,
    F: FnMut(usize, R) -> Result<()>,
{
    for_each_line::<R, _>(path, |line, record| visit(line, record?))
}

/// Load every record of a JSONL file in file order. Fails on the first bad line.
pub fn load_jsonl<R: Record>(path: &Path) -> Result<Vec<R>> {
    let mut records: Vec<R> = Vec::new();
    for_each_record::<R, _>(path, |_, record| {
        records.push(record);
        Ok(())
    })?;
    debug!("Loaded {} {} from {}", records.len(), R::KIND, path.display());
    Ok(records)
}

/// Like `load_jsonl`, but lines failing to decode are skipped and counted
pub fn load_jsonl_lenient<R: Record>(path: &Path) -> Result<(Vec<R>, usize)> {
    let mut records: Vec<R> = Vec::new();
    let mut skipped = 0;
    for_each_line::<R, _>(path, |_, record| {
        match record {
            Ok(record) => records.push(record),
            Err(e) if e.is_record_error() => {
                warn!("⚠️  Skipping unreadable {} line: {}", R::KIND, e);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    })?;
    Ok((records, skipped))
}

/// Build id -> resolution, applying `policy` to repeated ids
pub fn load_resolutions(
    path: &Path,
    policy: DuplicatePolicy,
) -> Result<HashMap<String, ResolutionRecord>> {
    let mut resolutions: HashMap<String, ResolutionRecord> = HashMap::new();
    for_each_record(path, |line, record: ResolutionRecord| {
        if resolutions.contains_key(&record.id) {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(EvalError::DuplicateResolution {
                        path: path.to_path_buf(),
                        line,
                        id: record.id,
                    });
                }
                DuplicatePolicy::LastWins => {
                    warn!(
                        "⚠️  Duplicate resolution for {} at line {}, later entry wins",
                        record.id, line
                    );
                }
            }
        }
        resolutions.insert(record.id.clone(), record);
        Ok(())
    })?;
    Ok(resolutions)
}

/// Build id -> event. An absent path, or a path that does not exist, is an empty map.
pub fn load_events(path: Option<&Path>) -> Result<HashMap<String, EventSpec>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    if !path.exists() {
        info!("Events file {} not found, scoring without market baselines", path.display());
        return Ok(HashMap::new());
    }
    Ok(load_jsonl::<EventSpec>(path)?
        .into_iter()
        .map(|event| (event.id.clone(), event))
        .collect())
}

/// Inner-join predictions to resolutions, left-enrich with events.
///
/// Output order follows `predictions`, filtered to resolved ids.
pub fn join(
    predictions: &[PredictionRecord],
    resolutions: &HashMap<String, ResolutionRecord>,
    events: &HashMap<String, EventSpec>,
) -> MergeOutput {
    let mut stats = MergeStats {
        predictions: predictions.len(),
        resolutions: resolutions.len(),
        events: events.len(),
        ..MergeStats::default()
    };
    let mut seen: HashSet<&str> = HashSet::new();
    let mut records = Vec::with_capacity(predictions.len());

    for prediction in predictions {
        if !seen.insert(prediction.id.as_str()) {
            warn!("⚠️  Duplicate prediction for {}, scoring both", prediction.id);
            stats.duplicate_predictions += 1;
        }

        let Some(resolution) = resolutions.get(&prediction.id) else {
            debug!("No resolution for {}, excluded", prediction.id);
            stats.unresolved += 1;
            continue;
        };

        let event = events.get(&prediction.id);
        if event.is_none() {
            stats.without_event += 1;
        }

        let (model, prediction_timestamp) = match &prediction.metadata {
            Some(meta) => (Some(meta.model.clone()), Some(meta.timestamp.raw.clone())),
            None => (None, None),
        };

        records.push(ScoredRecord {
            event_id: prediction.id.clone(),
            probability: prediction.prediction.probability,
            outcome: resolution.outcome,
            market_probability: event.and_then(|e| e.baseline_probability),
            model,
            prediction_timestamp,
            question: event.map(|e| e.question.clone()),
        });
    }

    stats.merged = records.len();
    info!(
        "🔗 Merged {} of {} predictions ({} unresolved, {} without event)",
        stats.merged, stats.predictions, stats.unresolved, stats.without_event
    );
    MergeOutput { records, stats }
}

/// The three parsed sources of one evaluation
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub predictions: Vec<PredictionRecord>,
    pub resolutions: HashMap<String, ResolutionRecord>,
    pub events: HashMap<String, EventSpec>,
}

impl Inputs {
    pub fn join(&self) -> MergeOutput {
        join(&self.predictions, &self.resolutions, &self.events)
    }
}

/// Load predictions, resolutions and (optionally) events
pub fn load_inputs(
    predictions_path: &Path,
    resolutions_path: &Path,
    events_path: Option<&Path>,
    policy: DuplicatePolicy,
) -> Result<Inputs> {
    Ok(Inputs {
        predictions: load_jsonl::<PredictionRecord>(predictions_path)?,
        resolutions: load_resolutions(resolutions_path, policy)?,
        events: load_events(events_path)?,
    })
}

/// Load all three sources and join them
pub fn merge(
    predictions_path: &Path,
    resolutions_path: &Path,
    events_path: Option<&Path>,
    policy: DuplicatePolicy,
) -> Result<MergeOutput> {
    Ok(load_inputs(predictions_path, resolutions_path, events_path, policy)?.join())
}
