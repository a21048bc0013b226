pub mod config;
pub mod doctor;
pub mod runner;
pub mod util;

pub use config::*;
pub use doctor::*;
pub use runner::*;
pub use util::*;

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use fedidir_artifacts::{
        ArtifactKind, FsSnapshotStore, PublishMode, SnapshotBatch, SnapshotManifest, SnapshotWriter,
    };
    use fedidir_core::{
        CommunityRecord, FailureKind, FailureMarker, FediverseRecord, InstanceRecord, RunId,
        UptimeSnapshot,
    };
    use fedidir_storage::{InMemoryStorage, RecordFamily, StorageReader, StorageResult};
    use fedidir_storage_sqlite::SqliteStorage;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    const NOW: i64 = 10_000_000;
    const MAX_AGE: i64 = 5_000_000;

    fn instance(
        host: &str,
        crawled: Option<i64>,
        linked: &[&str],
        blocked: &[&str],
    ) -> InstanceRecord {
        serde_json::from_value(json!({
            "siteData": {
                "site": { "actor_id": format!("https://{host}/"), "name": host },
                "federated": { "linked": linked, "blocked": blocked }
            },
            "lastCrawled": crawled
        }))
        .unwrap()
    }

    fn community(host: &str, name: &str, subscribers: i64, crawled: i64) -> CommunityRecord {
        serde_json::from_value(json!({
            "community": {
                "actor_id": format!("https://{host}/c/{name}"),
                "name": name,
                "title": name
            },
            "counts": { "subscribers": subscribers },
            "lastCrawled": crawled
        }))
        .unwrap()
    }

    fn server(name: &str, version: Option<&str>) -> FediverseRecord {
        FediverseRecord { name: Some(name.into()), version: version.map(Into::into) }
    }

    fn seeded() -> InMemoryStorage {
        let s = InMemoryStorage::new();
        s.insert_instance(instance("a.example", Some(NOW - 1_000), &["b.example"], &["d.example"]));
        s.insert_instance(instance("b.example", Some(NOW - 1_000), &["a.example"], &[]));
        s.insert_instance(instance("stale.example", Some(NOW - MAX_AGE - 1), &[], &[]));
        s.insert_instance(instance("d.example", Some(NOW - 1_000), &[], &[]));
        s.insert_instance(instance("untimed.example", None, &[], &[]));
        s.insert_failure(FailureKind::Instance, "d.example", NOW - 500);

        s.insert_community(community("a.example", "rust", 40, NOW - 1_000));
        // hosted on a server that failed after this crawl
        s.insert_community(community("d.example", "gone", 5, NOW - 1_000));

        s.insert_fediverse("b.example", server("lemmy", Some("0.19.3")));
        s.insert_fediverse("a.example", server("mastodon", None));
        s.insert_fediverse_raw("fediverse:", server("lemmy", None));
        let uptime = json!({ "nodes": [{ "domain": "a.example", "uptime_alltime": "99.9" }] });
        s.set_uptime(serde_json::from_value(uptime).unwrap());
        s
    }

    fn pipeline(storage: impl StorageReader + 'static, out: &Path, mode: PublishMode) -> Pipeline {
        let writer = FsSnapshotStore::new(out.to_path_buf(), mode);
        Pipeline::new(Box::new(storage), Box::new(writer), MAX_AGE)
    }

    fn run(
        storage: impl StorageReader + 'static,
        out: &Path,
        mode: PublishMode,
    ) -> Result<RunSummary> {
        pipeline(storage, out, mode).run_at(NOW, false)
    }

    fn read_json(out: &Path, kind: ArtifactKind) -> Value {
        serde_json::from_slice(&std::fs::read(out.join(kind.file_name())).unwrap()).unwrap()
    }

    fn baseurls(doc: &Value) -> Vec<String> {
        doc.as_array().unwrap().iter().map(|v| v["baseurl"].as_str().unwrap().to_string()).collect()
    }

    #[test]
    fn run_publishes_filtered_snapshot() {
        let dir = tempdir().unwrap();
        let summary = run(seeded(), dir.path(), PublishMode::Staged).unwrap();

        assert_eq!(summary.instances.input, 5);
        assert_eq!(summary.instances.kept, 2);
        assert_eq!(summary.instances.stale, 1);
        assert_eq!(summary.instances.missing_time, 1);
        assert_eq!(summary.instances.failed_after_crawl, 1);
        assert_eq!(summary.communities.kept, 1);
        assert_eq!(summary.communities.failed_after_crawl, 1);
        assert_eq!(summary.fediverse, 2);
        assert_eq!(summary.rejected_keys, 1);

        let instances = read_json(dir.path(), ArtifactKind::Instances);
        assert_eq!(baseurls(&instances), ["a.example", "b.example"]);
        assert_eq!(instances[0]["score"], 1);
        assert_eq!(instances[0]["uptime"]["domain"], "a.example");
        assert!(instances[1]["uptime"].is_null());

        let communities = read_json(dir.path(), ArtifactKind::Communities);
        // owning server scores 1, times 40 subscribers
        assert_eq!(communities[0]["score"], 40);

        let fediverse = read_json(dir.path(), ArtifactKind::Fediverse);
        assert_eq!(fediverse[0]["url"], "a.example");
        assert_eq!(fediverse[1]["software"], "lemmy");

        let meta = read_json(dir.path(), ArtifactKind::Meta);
        assert_eq!(meta, json!({ "instances": 2, "communities": 1, "fediverse": 2, "time": NOW }));

        // the tally counts every crawled server, published or not
        let overview = read_json(dir.path(), ArtifactKind::Overview);
        assert_eq!(overview["blocked"]["d.example"], 1);
        assert_eq!(overview["instances"], 2);

        let manifest = summary.manifest.unwrap();
        assert_eq!(manifest.artifacts.len(), 5);
        assert_eq!(manifest.run_id, summary.run_id.as_str());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("public");
        let summary = pipeline(seeded(), &out, PublishMode::Staged).run_at(NOW, true).unwrap();
        assert_eq!(summary.instances.kept, 2);
        assert!(summary.manifest.is_none());
        assert!(!out.exists());
    }

    #[test]
    fn unavailable_source_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(seeded());
        let first = Pipeline::new(
            Box::new(SharedStorage(storage.clone())),
            Box::new(FsSnapshotStore::new(dir.path().to_path_buf(), PublishMode::Staged)),
            MAX_AGE,
        )
        .run_at(NOW, false)
        .unwrap();
        let before = std::fs::read(dir.path().join("instances.json")).unwrap();

        storage.set_unavailable(RecordFamily::Community);
        storage.insert_instance(instance("late.example", Some(NOW), &[], &[]));
        let err = Pipeline::new(
            Box::new(SharedStorage(storage.clone())),
            Box::new(FsSnapshotStore::new(dir.path().to_path_buf(), PublishMode::Staged)),
            MAX_AGE,
        )
        .run_at(NOW, false)
        .unwrap_err();
        assert!(format!("{:#}", err).contains("read community data"));

        assert_eq!(std::fs::read(dir.path().join("instances.json")).unwrap(), before);
        let store = FsSnapshotStore::new(dir.path().to_path_buf(), PublishMode::Staged);
        assert_eq!(store.read_manifest().unwrap().unwrap().run_id, first.run_id.as_str());
    }

    #[test]
    fn unavailable_failure_source_aborts_before_writing() {
        let dir = tempdir().unwrap();
        let storage = seeded();
        storage.set_unavailable(RecordFamily::Failure(FailureKind::Instance));
        let err = run(storage, dir.path(), PublishMode::Direct).unwrap_err();
        assert!(format!("{:#}", err).contains("instance failure data"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn community_failure_marker_alone_keeps_community() {
        let storage = InMemoryStorage::new();
        storage.insert_instance(instance("a.example", Some(NOW - 1_000), &[], &[]));
        storage.insert_community(community("a.example", "rust", 3, NOW - 1_000));
        storage.insert_failure(FailureKind::Community, "a.example", NOW - 500);

        let dir = tempdir().unwrap();
        let summary = run(storage, dir.path(), PublishMode::Staged).unwrap();
        assert_eq!(summary.communities.kept, 1);
        assert_eq!(summary.communities.failed_after_crawl, 0);
        assert_eq!(summary.instances.kept, 1);
    }

    #[test]
    fn instance_failure_drops_hosted_communities() {
        let storage = InMemoryStorage::new();
        storage.insert_community(community("a.example", "rust", 3, NOW - 1_000));
        storage.insert_failure(FailureKind::Instance, "a.example", NOW - 500);

        let p = pipeline(storage, Path::new("unused"), PublishMode::Staged);
        let summary = p.run_at(NOW, true).unwrap();
        assert_eq!(summary.communities.kept, 0);
        assert_eq!(summary.communities.failed_after_crawl, 1);
    }

    #[test]
    fn write_failure_fails_the_run() {
        let writer = FailingWriter(ArtifactKind::Communities);
        let p = Pipeline::new(Box::new(seeded()), Box::new(writer), MAX_AGE);
        let err = p.run_at(NOW, false).unwrap_err();
        assert!(format!("{:#}", err).contains("write communities.json"));
    }

    #[test]
    fn direct_mode_publishes_without_staging() {
        let dir = tempdir().unwrap();
        let summary = run(seeded(), dir.path(), PublishMode::Direct).unwrap();
        assert_eq!(summary.manifest.unwrap().mode, PublishMode::Direct);
        for kind in ArtifactKind::ALL {
            assert!(dir.path().join(kind.file_name()).exists());
        }
    }

    #[test]
    fn empty_store_publishes_empty_snapshot() {
        let dir = tempdir().unwrap();
        run(InMemoryStorage::new(), dir.path(), PublishMode::Staged).unwrap();
        assert_eq!(read_json(dir.path(), ArtifactKind::Instances), json!([]));
        assert_eq!(read_json(dir.path(), ArtifactKind::Overview)["linked"], json!({}));
        assert_eq!(read_json(dir.path(), ArtifactKind::Meta)["fediverse"], 0);
    }

    #[test]
    fn open_reads_sqlite_store_from_config() {
        let dir = tempdir().unwrap();
        let mut cfg = Config::default_for_dir();
        cfg.output.pretty = true;
        let db = SqliteStorage::open(&cfg.db_path(dir.path())).unwrap();
        let now = now_millis();
        let a = json!({
            "siteData": { "site": { "actor_id": "https://a.example/", "name": "A" } },
            "lastCrawled": now
        });
        db.put("instance:a.example", &a.to_string()).unwrap();
        db.put("fediverse:a.example", &json!({ "name": "lemmy" }).to_string()).unwrap();
        db.put("uptime:1", &serde_json::to_string(&UptimeSnapshot::default()).unwrap()).unwrap();
        drop(db);

        let summary = Pipeline::open(dir.path(), &cfg).unwrap().run_once(false).unwrap();
        assert_eq!(summary.instances.kept, 1);
        let out = cfg.output_dir(dir.path());
        let raw = std::fs::read_to_string(out.join("instances.json")).unwrap();
        assert!(raw.contains("\n  "));
    }

    #[test]
    fn open_fails_without_crawl_store() {
        let dir = tempdir().unwrap();
        assert!(Pipeline::open(dir.path(), &Config::default_for_dir()).is_err());
    }

    struct SharedStorage(Arc<InMemoryStorage>);

    impl StorageReader for SharedStorage {
        fn list_instance_data(&self) -> StorageResult<Vec<InstanceRecord>> {
            self.0.list_instance_data()
        }
        fn list_community_data(&self) -> StorageResult<Vec<CommunityRecord>> {
            self.0.list_community_data()
        }
        fn list_fediverse_data(&self) -> StorageResult<BTreeMap<String, FediverseRecord>> {
            self.0.list_fediverse_data()
        }
        fn list_failure_data(
            &self,
            kind: FailureKind,
        ) -> StorageResult<BTreeMap<String, FailureMarker>> {
            self.0.list_failure_data(kind)
        }
        fn latest_uptime_data(&self) -> StorageResult<UptimeSnapshot> {
            self.0.latest_uptime_data()
        }
    }

    struct FailingWriter(ArtifactKind);

    struct FailingBatch(ArtifactKind);

    impl SnapshotWriter for FailingWriter {
        fn begin(&self, _run_id: &RunId, _time_ms: i64) -> Result<Box<dyn SnapshotBatch>> {
            Ok(Box::new(FailingBatch(self.0)))
        }
    }

    impl SnapshotBatch for FailingBatch {
        fn write(&mut self, kind: ArtifactKind, _bytes: &[u8]) -> Result<()> {
            if kind == self.0 {
                return Err(anyhow!("disk full"));
            }
            Ok(())
        }
        fn commit(self: Box<Self>) -> Result<SnapshotManifest> {
            Err(anyhow!("unreachable commit"))
        }
    }
}
