use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ServerIdentity;
use crate::score::{community_score, instance_score};
use crate::tally::FederationTally;
use crate::types::{CommunityCounts, CommunityRecord, InstanceRecord, UptimeRecord, UptimeSnapshot};

/// Latest uptime result per server, keyed by the node's `domain`.
#[derive(Clone, Debug, Default)]
pub struct UptimeIndex {
    nodes: HashMap<ServerIdentity, UptimeRecord>,
}

impl UptimeIndex {
    /// First node wins when a domain is reported twice.
    pub fn from_snapshot(snapshot: UptimeSnapshot) -> Self {
        let mut nodes = HashMap::with_capacity(snapshot.nodes.len());
        for node in snapshot.nodes {
            nodes.entry(ServerIdentity::from_host(&node.domain)).or_insert(node);
        }
        Self { nodes }
    }

    pub fn get(&self, id: &ServerIdentity) -> Option<&UptimeRecord> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocks {
    /// Servers that block this one.
    pub incoming: u64,
    /// Servers this one blocks.
    pub outgoing: u64,
}

/// Published shape of one instance in `instances.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceView {
    #[serde(skip)]
    pub identity: Option<ServerIdentity>,
    pub baseurl: String,
    pub url: String,
    pub name: String,
    pub desc: Option<String>,

    pub downvotes: Option<bool>,
    pub nsfw: Option<bool>,
    pub create_admin: Option<bool>,
    pub private: Option<bool>,
    pub fed: Option<bool>,

    pub date: Option<String>,
    pub version: Option<String>,
    pub open: Option<bool>,

    pub usage: Option<Value>,
    pub counts: Option<Value>,

    pub icon: Option<String>,
    pub banner: Option<String>,
    pub langs: Option<Value>,

    pub time: Option<i64>,
    pub score: i64,
    pub uptime: Option<UptimeRecord>,
    pub blocks: Blocks,
}

/// Published shape of one community in `communities.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunityView {
    #[serde(skip)]
    pub identity: Option<ServerIdentity>,
    pub baseurl: String,
    pub url: String,
    pub name: String,
    pub title: String,
    pub desc: Option<String>,
    pub icon: Option<String>,
    pub banner: Option<String>,
    pub nsfw: Option<bool>,
    pub counts: Option<CommunityCounts>,
    pub time: Option<i64>,
    pub score: i64,
}

fn baseurl(identity: Option<&ServerIdentity>) -> String {
    identity.map(|id| id.as_str().to_string()).unwrap_or_default()
}

pub fn normalize_instance(
    record: &InstanceRecord,
    tally: &FederationTally,
    uptime: &UptimeIndex,
) -> InstanceView {
    let identity = record.identity();
    let site = &record.site_data.site;
    let config = record.config().cloned().unwrap_or_default();
    let node = record.node_data.as_ref();

    InstanceView {
        baseurl: baseurl(identity.as_ref()),
        url: site.actor_id.clone(),
        name: site.name.clone(),
        desc: site.description.clone(),

        downvotes: config.enable_downvotes,
        nsfw: config.enable_nsfw,
        create_admin: config.community_creation_admin_only,
        private: config.private_instance,
        fed: config.federation_enabled,

        date: site.published.clone(),
        version: record.software().and_then(|s| s.version.clone()),
        open: node.and_then(|n| n.open_registrations),

        usage: node.and_then(|n| n.usage.clone()),
        counts: record.site_data.counts.clone(),

        icon: site.icon.clone(),
        banner: site.banner.clone(),
        langs: record.langs.clone(),

        time: record.last_crawled,
        score: instance_score(identity.as_ref(), tally),
        uptime: identity.as_ref().and_then(|id| uptime.get(id)).cloned(),
        blocks: Blocks {
            incoming: identity.as_ref().map(|id| tally.blocked(id)).unwrap_or(0),
            outgoing: record.outgoing_blocks(),
        },
        identity,
    }
}

pub fn normalize_community(record: &CommunityRecord, tally: &FederationTally) -> CommunityView {
    let identity = record.identity();
    let meta = &record.community;

    CommunityView {
        baseurl: baseurl(identity.as_ref()),
        url: meta.actor_id.clone(),
        name: meta.name.clone(),
        title: meta.title.clone(),
        desc: meta.description.clone(),
        icon: meta.icon.clone(),
        banner: meta.banner.clone(),
        nsfw: meta.nsfw,
        counts: record.counts.clone(),
        time: record.last_crawled,
        score: community_score(identity.as_ref(), tally, record.subscribers()),
        identity,
    }
}
