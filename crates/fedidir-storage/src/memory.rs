use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use fedidir_core::{
    CommunityRecord, FailureKind, FailureMarker, FediverseRecord, InstanceRecord, ServerIdentity,
    StorageKey, UptimeSnapshot,
};

use crate::error::{RecordFamily, StorageError, StorageResult};
use crate::traits::StorageReader;

/// In-memory store for tests. Sources can be marked unavailable to exercise
/// the pipeline's abort path.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    instances: Vec<InstanceRecord>,
    communities: Vec<CommunityRecord>,
    fediverse: BTreeMap<String, FediverseRecord>,
    failures: BTreeMap<String, FailureMarker>,
    uptime: UptimeSnapshot,
    unavailable: HashSet<RecordFamily>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_instance(&self, record: InstanceRecord) {
        self.inner.lock().unwrap().instances.push(record);
    }

    pub fn insert_community(&self, record: CommunityRecord) {
        self.inner.lock().unwrap().communities.push(record);
    }

    /// Stores under `fediverse:<host>`.
    pub fn insert_fediverse(&self, host: &str, record: FediverseRecord) {
        let key = StorageKey::Fediverse(ServerIdentity::from_host(host)).to_string();
        self.inner.lock().unwrap().fediverse.insert(key, record);
    }

    /// Stores a raw, possibly malformed, fediverse key.
    pub fn insert_fediverse_raw(&self, key: &str, record: FediverseRecord) {
        self.inner.lock().unwrap().fediverse.insert(key.to_string(), record);
    }

    /// Stores under `error:<kind>:<host>`.
    pub fn insert_failure(&self, kind: FailureKind, host: &str, time: i64) {
        let key = StorageKey::Failure { kind, host: ServerIdentity::from_host(host) }.to_string();
        self.inner.lock().unwrap().failures.insert(key, FailureMarker { time, error: None });
    }

    pub fn set_uptime(&self, snapshot: UptimeSnapshot) {
        self.inner.lock().unwrap().uptime = snapshot;
    }

    pub fn set_unavailable(&self, family: RecordFamily) {
        self.inner.lock().unwrap().unavailable.insert(family);
    }

    fn check(inner: &Inner, family: RecordFamily) -> StorageResult<()> {
        if inner.unavailable.contains(&family) {
            let message = "source marked unavailable".to_string();
            return Err(StorageError::Query { family, message });
        }
        Ok(())
    }
}

impl StorageReader for InMemoryStorage {
    fn list_instance_data(&self) -> StorageResult<Vec<InstanceRecord>> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner, RecordFamily::Instance)?;
        Ok(inner.instances.clone())
    }

    fn list_community_data(&self) -> StorageResult<Vec<CommunityRecord>> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner, RecordFamily::Community)?;
        Ok(inner.communities.clone())
    }

    fn list_fediverse_data(&self) -> StorageResult<BTreeMap<String, FediverseRecord>> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner, RecordFamily::Fediverse)?;
        Ok(inner.fediverse.clone())
    }

    fn list_failure_data(
        &self,
        kind: FailureKind,
    ) -> StorageResult<BTreeMap<String, FailureMarker>> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner, RecordFamily::Failure(kind))?;
        let prefix = format!("error:{}:", kind);
        Ok(inner
            .failures
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn latest_uptime_data(&self) -> StorageResult<UptimeSnapshot> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner, RecordFamily::Uptime)?;
        Ok(inner.uptime.clone())
    }
}
