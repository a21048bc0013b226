use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The five documents published per run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Instances,
    Communities,
    Fediverse,
    Meta,
    Overview,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Instances,
        ArtifactKind::Communities,
        ArtifactKind::Fediverse,
        ArtifactKind::Meta,
        ArtifactKind::Overview,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Instances => "instances.json",
            ArtifactKind::Communities => "communities.json",
            ArtifactKind::Fediverse => "fediverse.json",
            ArtifactKind::Meta => "meta.json",
            ArtifactKind::Overview => "overview.json",
        }
    }
}

/// How a run's artifacts become visible to readers.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Stage all five, then move them into place together.
    #[default]
    Staged,
    /// Move each artifact into place as soon as it is written.
    Direct,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub name: String,
    pub sha256: String,
    pub bytes: u64,
}

impl ArtifactRecord {
    pub fn describe(kind: ArtifactKind, bytes: &[u8]) -> Self {
        Self {
            name: kind.file_name().to_string(),
            sha256: hex::encode(Sha256::digest(bytes)),
            bytes: bytes.len() as u64,
        }
    }
}

/// `manifest.json`, published after a run's artifacts are in place.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotManifest {
    pub run_id: String,
    pub time: i64,
    pub mode: PublishMode,
    pub artifacts: Vec<ArtifactRecord>,
}

pub const MANIFEST_FILE: &str = "manifest.json";
