//! Error taxonomy for the warehouse build.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    /// The source file could not be opened or read.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header row missing, blank, duplicated or lacking a required column.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Storage failure while persisting one of the dimension tables.
    #[error("failed to build dimension {table}: {source}")]
    DimensionBuild {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("warehouse error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
