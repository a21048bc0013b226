//! Raw crawl documents as the crawler stores them.
//!
//! Nested fields the crawler may leave out are `Option`s; accessors on the
//! record types expose that absence instead of defaulting it away.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::ServerIdentity;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub site_data: SiteData,
    #[serde(default)]
    pub node_data: Option<NodeData>,
    #[serde(default)]
    pub langs: Option<Value>,
    #[serde(default)]
    pub last_crawled: Option<i64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteData {
    pub site: Site,
    #[serde(default)]
    pub config: Option<SiteConfig>,
    #[serde(default)]
    pub counts: Option<Value>,
    #[serde(default)]
    pub federated: Option<Federated>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Site {
    #[serde(default)]
    pub actor_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    #[serde(default)]
    pub enable_downvotes: Option<bool>,
    #[serde(default)]
    pub enable_nsfw: Option<bool>,
    #[serde(default)]
    pub community_creation_admin_only: Option<bool>,
    #[serde(default)]
    pub private_instance: Option<bool>,
    #[serde(default)]
    pub federation_enabled: Option<bool>,
}

/// Federation lists as declared by one server. Entries stay untyped JSON so
/// that non-string entries can be skipped during tallying instead of failing
/// the whole record.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Federated {
    #[serde(default)]
    pub linked: Vec<Value>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub blocked: Option<Vec<Value>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default)]
    pub software: Option<Software>,
    #[serde(default)]
    pub open_registrations: Option<bool>,
    #[serde(default)]
    pub usage: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Software {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl InstanceRecord {
    pub fn identity(&self) -> Option<ServerIdentity> {
        ServerIdentity::from_actor_url(&self.site_data.site.actor_id)
    }

    pub fn federation(&self) -> Option<&Federated> {
        self.site_data.federated.as_ref()
    }

    pub fn config(&self) -> Option<&SiteConfig> {
        self.site_data.config.as_ref()
    }

    pub fn software(&self) -> Option<&Software> {
        self.node_data.as_ref().and_then(|n| n.software.as_ref())
    }

    /// Size of this server's own blocklist, counting every entry.
    pub fn outgoing_blocks(&self) -> u64 {
        self.federation()
            .and_then(|f| f.blocked.as_ref())
            .map(|b| b.len() as u64)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommunityRecord {
    pub community: CommunityMeta,
    #[serde(default)]
    pub counts: Option<CommunityCounts>,
    #[serde(default)]
    pub last_crawled: Option<i64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CommunityMeta {
    #[serde(default)]
    pub actor_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub nsfw: Option<bool>,
}

/// Community aggregate counts. Only `subscribers` feeds scoring; everything
/// else is carried through to the published record untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CommunityCounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<i64>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CommunityRecord {
    /// Host of the instance the community lives on.
    pub fn identity(&self) -> Option<ServerIdentity> {
        ServerIdentity::from_actor_url(&self.community.actor_id)
    }

    pub fn subscribers(&self) -> Option<i64> {
        self.counts.as_ref().and_then(|c| c.subscribers)
    }
}

/// Software self-report for any fediverse server, stored under `fediverse:<host>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FediverseRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl FediverseRecord {
    /// Software name, if the record is complete enough to publish.
    pub fn software_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Most recent failed crawl attempt, stored under `error:<kind>:<host>`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureMarker {
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One node from the latest uptime check. `domain` is the join key; every
/// other field is published as received.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UptimeRecord {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UptimeSnapshot {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub nodes: Vec<UptimeRecord>,
}
