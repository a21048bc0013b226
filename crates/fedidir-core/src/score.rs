use crate::ids::ServerIdentity;
use crate::tally::FederationTally;

/// Points per server that lists this one as linked.
pub const LINKED_WEIGHT: i64 = 1;
/// Points per server that explicitly allow-lists this one.
pub const ALLOWED_WEIGHT: i64 = 2;
/// Points taken away per server that blocks this one.
pub const BLOCKED_PENALTY: i64 = 10;

/// Reputation of a server from its federation standing:
/// `linked·1 + allowed·2 − blocked·10`, scaled by `multiplier` when given.
///
/// A server without identity has no standing and scores 0.
pub fn score(
    identity: Option<&ServerIdentity>,
    tally: &FederationTally,
    multiplier: Option<i64>,
) -> i64 {
    let Some(id) = identity else {
        return 0;
    };
    let base = weighted(tally.linked(id), LINKED_WEIGHT)
        .saturating_add(weighted(tally.allowed(id), ALLOWED_WEIGHT))
        .saturating_sub(weighted(tally.blocked(id), BLOCKED_PENALTY));
    match multiplier {
        Some(m) => base.saturating_mul(m),
        None => base,
    }
}

pub fn instance_score(identity: Option<&ServerIdentity>, tally: &FederationTally) -> i64 {
    score(identity, tally, None)
}

/// Owning server's score times the community's subscribers. Unknown
/// subscriber counts are treated as zero subscribers.
pub fn community_score(
    identity: Option<&ServerIdentity>,
    tally: &FederationTally,
    subscribers: Option<i64>,
) -> i64 {
    score(identity, tally, Some(subscribers.unwrap_or(0)))
}

fn weighted(count: u64, weight: i64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX).saturating_mul(weight)
}
