use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EvalError, Result};
use crate::types::ScoredRecord;

/// Run directory name; one-second resolution, so two runs in the same
/// second share (and overwrite) a directory
pub const RUN_DIR_FORMAT: &str = "%Y%m%d-%H%M%S";

pub const METRICS_FILE: &str = "metrics.json";
pub const RECORDS_FILE: &str = "records.jsonl";
pub const INPUTS_FILE: &str = "inputs.json";

/// Provenance written to `inputs.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInputs {
    pub predictions_path: String,
    pub resolutions_path: String,
    pub events_path: Option<String>,
    pub records_path: String,
}

/// Append-only tree of evaluation runs under one root directory
#[derive(Debug, Clone)]
pub struct RunLog {
    root: PathBuf,
}

impl RunLog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.root.join(at.format(RUN_DIR_FORMAT).to_string())
    }

    /// Write metrics, scored records and input provenance for one run
    pub fn persist<M: Serialize>(
        &self,
        at: DateTime<Utc>,
        predictions_path: &Path,
        resolutions_path: &Path,
        events_path: Option<&Path>,
        metrics: &M,
        records: &[ScoredRecord],
    ) -> Result<PathBuf> {
        let run_dir = self.run_dir_for(at);
        fs::create_dir_all(&run_dir).map_err(|source| EvalError::Persist {
            path: run_dir.clone(),
            source,
        })?;

        let metrics_json = serde_json::to_string_pretty(metrics)?;
        write_atomic(&run_dir.join(METRICS_FILE), metrics_json.as_bytes())?;

        let mut lines = String::new();
        for record in records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }
        let records_path = run_dir.join(RECORDS_FILE);
        write_atomic(&records_path, lines.as_bytes())?;

        let inputs = RunInputs {
            predictions_path: predictions_path.display().to_string(),
            resolutions_path: resolutions_path.display().to_string(),
            events_path: events_path.map(|p| p.display().to_string()),
            records_path: records_path.display().to_string(),
        };
        let inputs_json = serde_json::to_string_pretty(&inputs)?;
        write_atomic(&run_dir.join(INPUTS_FILE), inputs_json.as_bytes())?;

        info!("💾 Run artifacts written to {}", run_dir.display());
        Ok(run_dir)
    }

    /// Existing run directories, oldest first
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let io_err = |source| EvalError::Io {
            path: self.root.clone(),
            source,
        };

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_dir() {
                runs.push(path);
            }
        }
        runs.sort();
        debug!("Found {} runs under {}", runs.len(), self.root.display());
        Ok(runs)
    }
}

/// Write to a temp sibling, then rename into place
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let persist_err = |source| EvalError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents).map_err(persist_err)?;
    fs::rename(&temp_path, path).map_err(persist_err)?;
    Ok(())
}
