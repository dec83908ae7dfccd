//! Error type shared by every backend and the coordinator

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A persisted line could not be parsed back into a record
    #[error("malformed record {line:?}: {reason}")]
    MalformedRecord { line: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// Coordinator operation referenced a charge with no partition
    #[error("no partition exists for charge {0}")]
    UnknownCharge(i32),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Partition file whose stem is not an integer charge
    #[error("invalid partition file name: {0}")]
    InvalidPartitionFile(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
