//! JSON-lines record decoding.
//!
//! Each line is decoded in two steps: JSON syntax first (failures become
//! `MalformedRecord`), then the record schema (failures become
//! `SchemaValidation` naming the dotted field path, the record id and the
//! constraint). Unknown fields are ignored.

use crate::error::{EvalError, Result};
use crate::types::{EventSpec, PredictionRecord, ResolutionRecord};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// A single schema failure: the dotted field path and what it broke
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub field: String,
    pub constraint: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    fn from_serde(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = err.path().to_string();
        let message = err.into_inner().to_string();

        // serde reports a missing key against the enclosing object
        if let Some(name) = message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.strip_suffix('`'))
        {
            return Violation::new(join_path(&path, name), "is required");
        }
        let field = if path == "." { "$".to_string() } else { path };
        if message.starts_with("invalid type: null") {
            return Violation::new(field, "is required");
        }
        Violation::new(field, message)
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent == "." {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn probability(field: &str, p: f64) -> std::result::Result<(), Violation> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Violation::new(field, format!("must be within [0, 1], got {}", p)))
    }
}

/// A record kind that can be decoded from one JSON object
pub trait Record: DeserializeOwned {
    const KIND: &'static str;

    /// Value constraints serde cannot express
    fn validate(&self) -> std::result::Result<(), Violation> {
        Ok(())
    }
}

impl Record for EventSpec {
    const KIND: &'static str = "events";

    fn validate(&self) -> std::result::Result<(), Violation> {
        match self.baseline_probability {
            Some(p) => probability("baseline_probability", p),
            None => Ok(()),
        }
    }
}

impl Record for PredictionRecord {
    const KIND: &'static str = "predictions";

    fn validate(&self) -> std::result::Result<(), Violation> {
        probability("prediction.probability", self.prediction.probability)
    }
}

impl Record for ResolutionRecord {
    const KIND: &'static str = "resolutions";

    fn validate(&self) -> std::result::Result<(), Violation> {
        match self.outcome {
            0 | 1 => Ok(()),
            other => Err(Violation::new(
                "outcome",
                format!("must be 0 or 1, got {}", other),
            )),
        }
    }
}

/// Decode one line of `path`. Blank lines yield `Ok(None)`.
///
/// `line_no` is 1-based and only used for error reporting.
pub fn parse_line<R: Record>(path: &Path, line_no: usize, line: &str) -> Result<Option<R>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|source| EvalError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;

    let record = serde_path_to_error::deserialize::<_, R>(&value)
        .map_err(Violation::from_serde)
        .and_then(|record| record.validate().map(|()| record))
        .map_err(|violation| EvalError::SchemaValidation {
            path: path.to_path_buf(),
            line: line_no,
            id: value.get("id").and_then(Value::as_str).map(str::to_string),
            field: violation.field,
            constraint: violation.constraint,
        })?;

    Ok(Some(record))
}
