use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use fedidir_artifacts::{
    ArtifactKind, FsSnapshotStore, SnapshotBatch, SnapshotManifest, SnapshotWriter,
};
use fedidir_core::{
    filter_records, normalize_community, normalize_instance, reduce_fediverse, FailureIndex,
    FailureKind, FederationTally, FilterPolicy, FilterReport, KeyError, MetaSummary,
    OverviewSummary, RunId, UptimeIndex,
};
use fedidir_storage::StorageReader;
use fedidir_storage_sqlite::SqliteStorage;

use crate::{util::now_millis, Config};

/// Outcome of one completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub run_id: RunId,
    pub time: i64,
    pub instances: FilterReport,
    pub communities: FilterReport,
    pub fediverse: usize,
    pub rejected_keys: usize,
    /// `None` for dry runs.
    pub manifest: Option<SnapshotManifest>,
}

pub struct Pipeline {
    pub storage: Box<dyn StorageReader>,
    pub writer: Box<dyn SnapshotWriter>,
    pub max_age_ms: i64,
    pub pretty: bool,
}

impl Pipeline {
    pub fn new(
        storage: Box<dyn StorageReader>,
        writer: Box<dyn SnapshotWriter>,
        max_age_ms: i64,
    ) -> Self {
        Self { storage, writer, max_age_ms, pretty: false }
    }

    /// Wires the SQLite crawl store (read-only) and the filesystem snapshot
    /// store from config.
    pub fn open(base: &Path, cfg: &Config) -> Result<Self> {
        let db_path = cfg.db_path(base);
        let storage = SqliteStorage::open_read_only(&db_path)?;
        let writer = FsSnapshotStore::new(cfg.output_dir(base), cfg.output.publish);
        Ok(Self {
            storage: Box::new(storage),
            writer: Box::new(writer),
            max_age_ms: cfg.max_age_ms(),
            pretty: cfg.output.pretty,
        })
    }

    pub fn run_once(&self, dry_run: bool) -> Result<RunSummary> {
        self.run_at(now_millis(), dry_run)
    }

    /// One full pass: read, tally, normalize, filter, publish. Any source
    /// or write failure aborts the run; nothing is retried.
    pub fn run_at(&self, now_ms: i64, dry_run: bool) -> Result<RunSummary> {
        let run_id = RunId::new();
        let policy = FilterPolicy { now_ms, max_age_ms: self.max_age_ms };
        let mut rejected: Vec<KeyError> = vec![];
        info!(run_id = %run_id, dry_run, max_age_ms = self.max_age_ms, "starting run");

        let uptime = self.storage.latest_uptime_data().context("read uptime data")?;
        let uptime = UptimeIndex::from_snapshot(uptime);
        info!(nodes = uptime.len(), "uptime");

        // communities are judged by their host's instance failures too
        let failures = self.failures(FailureKind::Instance, &mut rejected)?;
        info!(servers = failures.len(), "failure markers");

        let instances = self.storage.list_instance_data().context("read instance data")?;
        let tally = FederationTally::build(&instances);
        info!(
            linked = tally.linked.len(),
            allowed = tally.allowed.len(),
            blocked = tally.blocked.len(),
            "federation tally"
        );

        let mut batch = if dry_run { None } else { Some(self.writer.begin(&run_id, now_ms)?) };

        let instance_views: Vec<_> =
            instances.iter().map(|r| normalize_instance(r, &tally, &uptime)).collect();
        drop(instances);
        let (instance_views, instance_report) = filter_records(instance_views, &failures, &policy);
        log_report("instances", &instance_report);
        self.emit(&mut batch, ArtifactKind::Instances, &instance_views)?;

        let communities = self.storage.list_community_data().context("read community data")?;
        let community_views: Vec<_> =
            communities.iter().map(|r| normalize_community(r, &tally)).collect();
        drop(communities);
        let (community_views, community_report) =
            filter_records(community_views, &failures, &policy);
        log_report("communities", &community_report);
        self.emit(&mut batch, ArtifactKind::Communities, &community_views)?;

        let fediverse_data = self.storage.list_fediverse_data().context("read fediverse data")?;
        let fediverse = reduce_fediverse(&fediverse_data);
        note_rejected("fediverse", &fediverse.rejected);
        rejected.extend(fediverse.rejected);
        let fediverse = fediverse.value;
        info!(input = fediverse_data.len(), kept = fediverse.len(), "fediverse servers");
        self.emit(&mut batch, ArtifactKind::Fediverse, &fediverse)?;

        let meta = MetaSummary {
            instances: instance_views.len(),
            communities: community_views.len(),
            fediverse: fediverse.len(),
            time: now_ms,
        };
        self.emit(&mut batch, ArtifactKind::Meta, &meta)?;

        let overview = OverviewSummary::new(instance_views.len(), community_views.len(), &tally);
        self.emit(&mut batch, ArtifactKind::Overview, &overview)?;

        let manifest = match batch {
            Some(b) => Some(b.commit().context("publish snapshot")?),
            None => None,
        };
        info!(run_id = %run_id, "run complete");

        Ok(RunSummary {
            run_id,
            time: now_ms,
            instances: instance_report,
            communities: community_report,
            fediverse: fediverse.len(),
            rejected_keys: rejected.len(),
            manifest,
        })
    }

    fn failures(&self, kind: FailureKind, rejected: &mut Vec<KeyError>) -> Result<FailureIndex> {
        let markers = self
            .storage
            .list_failure_data(kind)
            .with_context(|| format!("read {} failure data", kind))?;
        let decoded = FailureIndex::from_markers(kind, &markers);
        note_rejected("failure", &decoded.rejected);
        rejected.extend(decoded.rejected);
        Ok(decoded.value)
    }

    fn emit<T: Serialize + ?Sized>(
        &self,
        batch: &mut Option<Box<dyn SnapshotBatch>>,
        kind: ArtifactKind,
        value: &T,
    ) -> Result<()> {
        let Some(batch) = batch.as_mut() else {
            return Ok(());
        };
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        batch.write(kind, &bytes).with_context(|| format!("write {}", kind.file_name()))
    }
}

fn log_report(what: &str, r: &FilterReport) {
    info!(
        what,
        input = r.input,
        kept = r.kept,
        failed_after_crawl = r.failed_after_crawl,
        missing_time = r.missing_time,
        stale = r.stale,
        blank = r.blank,
        "filtered"
    );
}

fn note_rejected(what: &str, rejected: &[KeyError]) {
    for e in rejected {
        warn!(what, error = %e, "skipping undecodable key");
    }
}
