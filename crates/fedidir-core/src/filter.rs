use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ids::ServerIdentity;
use crate::keys::{failure_identity, Decoded};
use crate::model::{DropReason, FailureKind};
use crate::normalize::{CommunityView, InstanceView};
use crate::types::FailureMarker;

/// Latest failure time per server for one failure kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureIndex {
    latest: HashMap<ServerIdentity, i64>,
}

impl FailureIndex {
    /// Decodes `error:<kind>:<host>` keys. Keys outside that namespace are
    /// returned as rejected rather than guessed at.
    pub fn from_markers(
        kind: FailureKind,
        markers: &BTreeMap<String, FailureMarker>,
    ) -> Decoded<Self> {
        let mut index = Self::default();
        let mut rejected = vec![];
        for (key, marker) in markers {
            match failure_identity(kind, key) {
                Ok(id) => index.insert(id, marker.time),
                Err(e) => rejected.push(e),
            }
        }
        Decoded { value: index, rejected }
    }

    pub fn insert(&mut self, id: ServerIdentity, time: i64) {
        let slot = self.latest.entry(id).or_insert(time);
        *slot = (*slot).max(time);
    }

    pub fn latest(&self, id: &ServerIdentity) -> Option<i64> {
        self.latest.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Reference time for age checks, Unix millis.
    pub now_ms: i64,
    /// Records older than this are dropped; exactly this old is kept.
    pub max_age_ms: i64,
}

/// Anything the staleness/failure filter can judge.
pub trait Filterable {
    fn identity(&self) -> Option<&ServerIdentity>;
    fn crawled_at(&self) -> Option<i64>;
    /// True when every identifying field is an empty string.
    fn is_blank(&self) -> bool;
}

impl Filterable for InstanceView {
    fn identity(&self) -> Option<&ServerIdentity> {
        self.identity.as_ref()
    }
    fn crawled_at(&self) -> Option<i64> {
        self.time
    }
    fn is_blank(&self) -> bool {
        self.url.is_empty() && self.name.is_empty()
    }
}

impl Filterable for CommunityView {
    fn identity(&self) -> Option<&ServerIdentity> {
        self.identity.as_ref()
    }
    fn crawled_at(&self) -> Option<i64> {
        self.time
    }
    fn is_blank(&self) -> bool {
        self.url.is_empty() && self.name.is_empty() && self.title.is_empty()
    }
}

/// A later failure overrides the last good crawl. Equal times keep the record.
pub fn failed_after_crawl(crawled_at: i64, failed_at: Option<i64>) -> bool {
    matches!(failed_at, Some(failed) if crawled_at < failed)
}

pub fn is_stale(crawled_at: i64, policy: &FilterPolicy) -> bool {
    policy.now_ms.saturating_sub(crawled_at) > policy.max_age_ms
}

/// First reason, if any, the record must not be published.
pub fn drop_reason<T: Filterable>(
    record: &T,
    failures: &FailureIndex,
    policy: &FilterPolicy,
) -> Option<DropReason> {
    let Some(crawled_at) = record.crawled_at() else {
        return Some(DropReason::MissingTime);
    };
    let failed_at = record.identity().and_then(|id| failures.latest(id));
    if failed_after_crawl(crawled_at, failed_at) {
        return Some(DropReason::FailedAfterCrawl);
    }
    if is_stale(crawled_at, policy) {
        return Some(DropReason::Stale);
    }
    if record.is_blank() {
        return Some(DropReason::Blank);
    }
    None
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub input: usize,
    pub kept: usize,
    pub failed_after_crawl: usize,
    pub missing_time: usize,
    pub stale: usize,
    pub blank: usize,
}

impl FilterReport {
    fn count(&mut self, reason: DropReason) {
        match reason {
            DropReason::FailedAfterCrawl => self.failed_after_crawl += 1,
            DropReason::MissingTime => self.missing_time += 1,
            DropReason::Stale => self.stale += 1,
            DropReason::Blank => self.blank += 1,
        }
    }

    pub fn dropped(&self) -> usize {
        self.input - self.kept
    }
}

/// Keeps the records that pass every predicate, preserving input order.
pub fn filter_records<T: Filterable>(
    records: Vec<T>,
    failures: &FailureIndex,
    policy: &FilterPolicy,
) -> (Vec<T>, FilterReport) {
    let mut report = FilterReport { input: records.len(), ..Default::default() };
    let kept: Vec<T> = records
        .into_iter()
        .filter(|r| match drop_reason(r, failures, policy) {
            Some(reason) => {
                report.count(reason);
                false
            }
            None => true,
        })
        .collect();
    report.kept = kept.len();
    (kept, report)
}
