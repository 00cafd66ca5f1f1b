//! Error taxonomy for the staging and correlation pipeline.

use crate::core::series::DataSource;
use std::path::PathBuf;
use thiserror::Error;

/// A single upstream row that could not be normalized. Always recovered
/// locally: the row is dropped and counted, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("unparseable date '{0}'")]
    Date(String),

    #[error("non-numeric value '{0}'")]
    Value(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0} produced no usable rows")]
    EmptySource(DataSource),

    #[error(
        "Insufficient panel data: {rows} row(s) x {columns} column(s) after pruning, \
         need at least {min_rows} x {min_columns}"
    )]
    InsufficientPanelData {
        rows: usize,
        columns: usize,
        min_rows: usize,
        min_columns: usize,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Stored record could not be decoded: {0}")]
    CorruptRecord(#[from] serde_json::Error),

    #[error("Missingness threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Another run holds the lock at {}", .0.display())]
    RunInProgress(PathBuf),

    #[error("Failed to manage lock file {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<fjall::Error> for PipelineError {
    fn from(e: fjall::Error) -> Self {
        PipelineError::StoreUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
