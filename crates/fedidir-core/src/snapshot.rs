use serde::{Deserialize, Serialize};

use crate::tally::{FederationTally, TallyMap};

/// `meta.json`: sizes of the published lists and when they were generated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaSummary {
    pub instances: usize,
    pub communities: usize,
    pub fediverse: usize,
    /// Unix millis.
    pub time: i64,
}

/// `overview.json`: published counts plus the full federation tallies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewSummary {
    pub instances: usize,
    pub communities: usize,
    pub linked: TallyMap,
    pub allowed: TallyMap,
    pub blocked: TallyMap,
}

impl OverviewSummary {
    pub fn new(instances: usize, communities: usize, tally: &FederationTally) -> Self {
        Self {
            instances,
            communities,
            linked: tally.linked.clone(),
            allowed: tally.allowed.clone(),
            blocked: tally.blocked.clone(),
        }
    }
}
