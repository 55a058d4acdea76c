use polars::prelude::{DataType, PolarsError};
use thiserror::Error;

/// Everything that can go wrong inside one pipeline step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("dataframe operation failed: {0}")]
    Frame(#[from] PolarsError),

    #[error("hand-off io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("invalid timestamp in batch: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("column {0} has unsupported dtype {1}")]
    UnsupportedColumn(String, DataType),

    #[error("row {0} is missing its capture timestamp")]
    MissingTimestamp(usize),
}

/// What one pipeline step reported back to the runner.
///
/// Failures are carried as data instead of bubbling up, so a broken step
/// never takes the scheduler down with it. The runner decides what happens
/// next (log, retry once, move on).
#[derive(Debug)]
pub enum StepOutcome {
    Completed { rows: usize },
    SkippedEmpty,
    Failed(StepError),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
