use std::fmt;

use fedidir_core::FailureKind;
use thiserror::Error;

/// Record family a read was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordFamily {
    Instance,
    Community,
    Fediverse,
    Failure(FailureKind),
    Uptime,
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFamily::Instance => f.write_str("instance"),
            RecordFamily::Community => f.write_str("community"),
            RecordFamily::Fediverse => f.write_str("fediverse"),
            RecordFamily::Failure(kind) => write!(f, "error:{}", kind),
            RecordFamily::Uptime => f.write_str("uptime"),
        }
    }
}

/// Read failures. Any of these makes the source unavailable for the run.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("reading {family} records failed: {message}")]
    Query { family: RecordFamily, message: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
