use std::fmt;

use serde::{Deserialize, Serialize};

/// Record family a failure marker was recorded under.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Instance,
    Community,
}

impl FailureKind {
    pub const ALL: [FailureKind; 2] = [FailureKind::Instance, FailureKind::Community];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Instance => "instance",
            FailureKind::Community => "community",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "instance" => Some(FailureKind::Instance),
            "community" => Some(FailureKind::Community),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a normalized record was left out of a published snapshot.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DropReason {
    /// The latest crawl attempt failed after the record was captured.
    FailedAfterCrawl,
    /// The record was never successfully crawled.
    MissingTime,
    /// The record is older than the configured maximum age.
    Stale,
    /// All identifying fields are empty.
    Blank,
}
