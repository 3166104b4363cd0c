use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("{kind} file not found: {}", .path.display())]
    MissingFile { kind: &'static str, path: PathBuf },

    #[error("malformed record in {} line {line}: {source}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid UTF-8 in {} line {line}: {source}", .path.display())]
    InvalidEncoding {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error(
        "schema violation in {} line {line} (id: {}): `{field}` {constraint}",
        .path.display(),
        .id.as_deref().unwrap_or("<unknown>")
    )]
    SchemaValidation {
        path: PathBuf,
        line: usize,
        id: Option<String>,
        field: String,
        constraint: String,
    },

    #[error("duplicate resolution for `{id}` in {} line {line}", .path.display())]
    DuplicateResolution { path: PathBuf, line: usize, id: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write run artifact {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl EvalError {
    /// True for failures caused by the content of an input line.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            EvalError::MalformedRecord { .. }
                | EvalError::InvalidEncoding { .. }
                | EvalError::SchemaValidation { .. }
                | EvalError::DuplicateResolution { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
