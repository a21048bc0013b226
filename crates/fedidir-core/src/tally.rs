use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ServerIdentity;
use crate::types::{Federated, InstanceRecord};

pub type TallyMap = BTreeMap<ServerIdentity, u64>;

/// How often each server shows up in other servers' federation lists.
///
/// Built once per run from the full instance set and passed by reference to
/// scoring and normalization; never mutated after `build` returns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationTally {
    pub linked: TallyMap,
    pub allowed: TallyMap,
    pub blocked: TallyMap,
}

impl FederationTally {
    pub fn build<'a, I>(instances: I) -> Self
    where
        I: IntoIterator<Item = &'a InstanceRecord>,
    {
        let mut tally = Self::default();
        for federated in instances.into_iter().filter_map(InstanceRecord::federation) {
            tally.record(federated);
        }
        tally
    }

    /// Adds one server's declared lists to the counts.
    pub fn record(&mut self, federated: &Federated) {
        bump_all(&mut self.linked, &federated.linked);
        if let Some(allowed) = &federated.allowed {
            bump_all(&mut self.allowed, allowed);
        }
        if let Some(blocked) = &federated.blocked {
            bump_all(&mut self.blocked, blocked);
        }
    }

    pub fn linked(&self, id: &ServerIdentity) -> u64 {
        self.linked.get(id).copied().unwrap_or(0)
    }

    pub fn allowed(&self, id: &ServerIdentity) -> u64 {
        self.allowed.get(id).copied().unwrap_or(0)
    }

    pub fn blocked(&self, id: &ServerIdentity) -> u64 {
        self.blocked.get(id).copied().unwrap_or(0)
    }
}

fn bump_all(map: &mut TallyMap, entries: &[Value]) {
    for entry in entries {
        // only string entries name a server
        if let Value::String(host) = entry {
            *map.entry(ServerIdentity::from_host(host)).or_insert(0) += 1;
        }
    }
}
