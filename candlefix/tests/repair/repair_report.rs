use candlefix::{CACHE_INVALIDATION_NOTICE, CancelToken, Interval, RepairReport};
use candlefix_mock::{InMemoryRepository, MockBehavior, Operation, fixtures};

use crate::helpers::{FUTURES, builder};

#[tokio::test]
async fn summary_lists_domains_failures_and_cache_notice() {
    let (repo, ctl) = InMemoryRepository::new_with_controller("mem");
    ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    ctl.insert(FUTURES, fixtures::clean_series("BTC/USDT", Interval::D1, 3))
        .await;
    ctl.set_partition_behavior(
        Operation::Fetch,
        candlefix::PartitionKey::new("BTC/USDT", Interval::D1),
        MockBehavior::Fail(candlefix::RepairError::Query("boom".into())),
    )
    .await;

    let report = builder(repo)
        .intervals(&[Interval::D1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();
    let text = report.to_string();

    assert!(text.contains("spot [ecosystem]: keyspace missing, skipped;"));
    assert!(text.contains("futures [futures]: scanned=2 duplicates_removed=0 open_fixed=1"));
    assert!(text.contains("failed BTC/USDT@1d: query failed: boom"));
    assert!(text.contains("total: scanned=2"));
    assert!(text.ends_with(&format!("NOTE: {CACHE_INVALIDATION_NOTICE}")));
}

#[tokio::test]
async fn report_serializes_for_machine_consumers() {
    let (repo, ctl) = InMemoryRepository::new_with_controller("mem");
    ctl.insert(FUTURES, fixtures::split_hour()).await;

    let report = builder(repo)
        .intervals(&[Interval::H1])
        .dry_run(true)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["domains"][0]["status"]["status"], "missing_keyspace");
    assert_eq!(json["domains"][1]["stats"]["duplicates_removed"], 2);

    let back: RepairReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}
