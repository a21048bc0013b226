use std::collections::BTreeMap;

use fedidir_core::{
    filter_records, instance_score, normalize_instance, reduce_fediverse, FailureIndex,
    FederationTally, FediverseEntry, FediverseRecord, FilterPolicy, InstanceRecord, OverviewSummary,
    ServerIdentity, UptimeIndex,
};
use serde_json::json;

fn instance(actor: &str, linked: &[&str], blocked: &[&str]) -> InstanceRecord {
    serde_json::from_value(json!({
        "siteData": {
            "site": { "actor_id": actor, "name": actor },
            "federated": { "linked": linked, "blocked": blocked }
        },
        "lastCrawled": 1_000
    }))
    .unwrap()
}

#[test]
fn test_blocklisted_server_scores_negative() {
    let a = instance("https://a.example/", &["b.example"], &[]);
    let b = instance("https://b.example/", &[], &[]);
    let blockers: Vec<_> = ["c", "d", "e"]
        .iter()
        .map(|h| instance(&format!("https://{h}.example/"), &[], &["b.example"]))
        .collect();

    let all: Vec<_> = [a, b.clone()].into_iter().chain(blockers).collect();
    let tally = FederationTally::build(&all);

    let id = ServerIdentity::from_host("b.example");
    assert_eq!(tally.linked(&id), 1);
    assert_eq!(tally.blocked(&id), 3);
    assert_eq!(instance_score(Some(&id), &tally), -29);

    let view = normalize_instance(&b, &tally, &UptimeIndex::default());
    assert_eq!(view.score, -29);
    assert_eq!(view.blocks.incoming, 3);
    assert_eq!(view.blocks.outgoing, 0);
}

#[test]
fn test_score_is_independent_of_tally_order() {
    let records = vec![
        instance("https://a.example/", &["x.example", "y.example"], &["z.example"]),
        instance("https://b.example/", &["x.example"], &["x.example"]),
        instance("https://c.example/", &["z.example"], &[]),
    ];
    let forward = FederationTally::build(&records);
    let reversed = FederationTally::build(records.iter().rev());
    assert_eq!(forward, reversed);

    for host in ["x.example", "y.example", "z.example"] {
        let id = ServerIdentity::from_host(host);
        assert_eq!(instance_score(Some(&id), &forward), instance_score(Some(&id), &reversed));
    }
}

#[test]
fn test_score_unchanged_by_filtering() {
    let mut stale = instance("https://a.example/", &["b.example"], &[]);
    stale.last_crawled = Some(0);
    let fresh = instance("https://b.example/", &[], &[]);
    let records = vec![stale, fresh];
    let tally = FederationTally::build(&records);

    let uptime = UptimeIndex::default();
    let views: Vec<_> = records.iter().map(|r| normalize_instance(r, &tally, &uptime)).collect();
    let before = views[1].score;
    let policy = FilterPolicy { now_ms: 1_000, max_age_ms: 500 };
    let (kept, report) = filter_records(views, &FailureIndex::default(), &policy);

    assert_eq!(report.stale, 1);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, before);
    assert_eq!(kept[0].score, 1);
}

#[test]
fn test_fediverse_key_reduces_to_entry() {
    let mut data = BTreeMap::new();
    data.insert(
        "fediverse:example.org".to_string(),
        FediverseRecord { name: Some("lemmy".into()), version: Some("0.19".into()) },
    );
    let out = reduce_fediverse(&data);
    assert_eq!(
        out.value,
        vec![FediverseEntry {
            url: "example.org".into(),
            software: "lemmy".into(),
            version: Some("0.19".into()),
        }]
    );
    assert_eq!(
        serde_json::to_value(&out.value[0]).unwrap(),
        json!({ "url": "example.org", "software": "lemmy", "version": "0.19" })
    );
}

#[test]
fn test_overview_serializes_tallies_as_maps() {
    let records = vec![instance("https://a.example/", &["b.example"], &["c.example"])];
    let tally = FederationTally::build(&records);
    let overview = OverviewSummary::new(1, 0, &tally);
    assert_eq!(
        serde_json::to_value(&overview).unwrap(),
        json!({
            "instances": 1,
            "communities": 0,
            "linked": { "b.example": 1 },
            "allowed": {},
            "blocked": { "c.example": 1 }
        })
    );
}
