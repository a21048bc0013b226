use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use fedidir_core::RunId;
use tracing::{debug, info, warn};

use crate::manifest::{ArtifactKind, ArtifactRecord, PublishMode, SnapshotManifest, MANIFEST_FILE};

/// Destination for a run's published artifacts.
pub trait SnapshotWriter: Send + Sync {
    fn begin(&self, run_id: &RunId, time_ms: i64) -> Result<Box<dyn SnapshotBatch>>;
}

/// Artifacts of one run. Dropping a batch without committing discards
/// whatever was staged.
pub trait SnapshotBatch {
    fn write(&mut self, kind: ArtifactKind, bytes: &[u8]) -> Result<()>;
    fn commit(self: Box<Self>) -> Result<SnapshotManifest>;
}

#[derive(Clone)]
pub struct FsSnapshotStore {
    pub root: PathBuf,
    pub mode: PublishMode,
}

impl FsSnapshotStore {
    pub fn new(root: PathBuf, mode: PublishMode) -> Self {
        Self { root, mode }
    }

    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    pub fn read_manifest(&self) -> Result<Option<SnapshotManifest>> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes =
            std::fs::read(&path).with_context(|| format!("read manifest {}", path.display()))?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

impl SnapshotWriter for FsSnapshotStore {
    fn begin(&self, run_id: &RunId, time_ms: i64) -> Result<Box<dyn SnapshotBatch>> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create output dir {}", self.root.display()))?;
        let staging = match self.mode {
            PublishMode::Staged => {
                sweep_staging(&self.root)?;
                let dir = self.root.join(format!("{}{}", STAGING_PREFIX, run_id.as_str()));
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("create staging dir {}", dir.display()))?;
                Some(dir)
            }
            PublishMode::Direct => None,
        };
        Ok(Box::new(FsBatch {
            root: self.root.clone(),
            staging,
            run_id: run_id.clone(),
            time_ms,
            mode: self.mode,
            written: BTreeMap::new(),
            committed: false,
        }))
    }
}

struct FsBatch {
    root: PathBuf,
    staging: Option<PathBuf>,
    run_id: RunId,
    time_ms: i64,
    mode: PublishMode,
    written: BTreeMap<ArtifactKind, ArtifactRecord>,
    committed: bool,
}

impl FsBatch {
    fn publish_manifest(&self) -> Result<SnapshotManifest> {
        let manifest = SnapshotManifest {
            run_id: self.run_id.as_str().to_string(),
            time: self.time_ms,
            mode: self.mode,
            artifacts: self.written.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        replace_file(&self.root, MANIFEST_FILE, &self.run_id, &bytes)?;
        Ok(manifest)
    }
}

impl SnapshotBatch for FsBatch {
    fn write(&mut self, kind: ArtifactKind, bytes: &[u8]) -> Result<()> {
        match &self.staging {
            Some(dir) => {
                let path = dir.join(kind.file_name());
                write_file(&path, bytes)?;
                debug!(artifact = kind.file_name(), bytes = bytes.len(), "staged");
            }
            None => {
                replace_file(&self.root, kind.file_name(), &self.run_id, bytes)?;
                info!(artifact = kind.file_name(), bytes = bytes.len(), "published");
            }
        }
        self.written.insert(kind, ArtifactRecord::describe(kind, bytes));
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<SnapshotManifest> {
        if let Some(dir) = self.staging.clone() {
            let missing: Vec<_> = ArtifactKind::ALL
                .iter()
                .filter(|k| !self.written.contains_key(*k))
                .map(|k| k.file_name())
                .collect();
            if !missing.is_empty() {
                return Err(anyhow!(
                    "refusing to publish incomplete snapshot; missing {:?}",
                    missing
                ));
            }
            for kind in ArtifactKind::ALL {
                let from = dir.join(kind.file_name());
                let to = self.root.join(kind.file_name());
                std::fs::rename(&from, &to)
                    .with_context(|| format!("publish {} -> {}", from.display(), to.display()))?;
            }
            info!(
                artifacts = ArtifactKind::ALL.len(),
                dir = %self.root.display(),
                "published snapshot set"
            );
        }
        let manifest = self.publish_manifest()?;
        self.committed = true;
        if let Some(dir) = self.staging.take() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!(dir = %dir.display(), error = %e, "could not remove staging dir");
            }
        }
        Ok(manifest)
    }
}

impl Drop for FsBatch {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(dir) = &self.staging {
            warn!(run_id = %self.run_id, "discarding uncommitted snapshot");
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

const STAGING_PREFIX: &str = ".staging-";

/// Removes staging dirs left by runs that died before commit or cleanup.
fn sweep_staging(root: &Path) -> Result<()> {
    let entries =
        std::fs::read_dir(root).with_context(|| format!("list output dir {}", root.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        let path = entry.path();
        warn!(dir = %path.display(), "removing abandoned staging dir");
        std::fs::remove_dir_all(&path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

/// Full-content write; the handle is closed on every path out.
fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path).with_context(|| format!("open {}", path.display()))?;
    file.write_all(bytes).with_context(|| format!("write {}", path.display()))?;
    file.sync_all().with_context(|| format!("sync {}", path.display()))?;
    Ok(())
}

/// Writes next to the destination and renames over it, so readers see either
/// the old document or the new one.
fn replace_file(dir: &Path, name: &str, run_id: &RunId, bytes: &[u8]) -> Result<()> {
    let tmp = dir.join(format!(".{}.{}.tmp", name, run_id.as_str()));
    let dest = dir.join(name);
    let res = write_file(&tmp, bytes).and_then(|_| {
        std::fs::rename(&tmp, &dest).with_context(|| format!("replace {}", dest.display()))
    });
    if res.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    res
}
