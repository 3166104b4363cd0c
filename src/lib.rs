// Forecast Evaluation - Benchmark Scorer
// Joins predictions, resolutions and event snapshots, scores forecasts,
// and records every run under a timestamped directory

pub mod config;
pub mod coverage;
pub mod error;
pub mod evaluator;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod parser;
pub mod run_log;
pub mod types;

pub use config::Config;
pub use error::{EvalError, Result};
pub use evaluator::{EvaluationMetrics, EvaluationResult, Evaluator};
