use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::{fediverse_identity, Decoded};
use crate::types::FediverseRecord;

/// One row of `fediverse.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FediverseEntry {
    pub url: String,
    pub software: String,
    pub version: Option<String>,
}

/// Flattens the `fediverse:<host>` keyspace, skipping records without a
/// software name. Output is sorted by `url`.
pub fn reduce_fediverse(data: &BTreeMap<String, FediverseRecord>) -> Decoded<Vec<FediverseEntry>> {
    let mut entries = Vec::with_capacity(data.len());
    let mut rejected = vec![];

    for (key, record) in data {
        let id = match fediverse_identity(key) {
            Ok(id) => id,
            Err(e) => {
                rejected.push(e);
                continue;
            }
        };
        if let Some(software) = record.software_name() {
            entries.push(FediverseEntry {
                url: id.as_str().to_string(),
                software: software.to_string(),
                version: record.version.clone(),
            });
        }
    }

    entries.sort_by(|a, b| a.url.cmp(&b.url));
    Decoded { value: entries, rejected }
}
