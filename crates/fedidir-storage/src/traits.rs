use std::collections::BTreeMap;

use fedidir_core::{
    CommunityRecord, FailureKind, FailureMarker, FediverseRecord, InstanceRecord, UptimeSnapshot,
};

use crate::error::StorageResult;

/// Read-only view of the crawler's store. Implementations skip individual
/// records that fail to decode; only whole-source failures are errors.
pub trait StorageReader: Send + Sync {
    fn list_instance_data(&self) -> StorageResult<Vec<InstanceRecord>>;

    fn list_community_data(&self) -> StorageResult<Vec<CommunityRecord>>;

    /// Keys keep their `fediverse:` namespace.
    fn list_fediverse_data(&self) -> StorageResult<BTreeMap<String, FediverseRecord>>;

    /// Keys keep their `error:<kind>:` namespace.
    fn list_failure_data(
        &self,
        kind: FailureKind,
    ) -> StorageResult<BTreeMap<String, FailureMarker>>;

    fn latest_uptime_data(&self) -> StorageResult<UptimeSnapshot>;
}
