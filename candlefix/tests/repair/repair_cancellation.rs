use std::time::Duration;

use candlefix::{Interval, MarketDomain, cancel_pair};
use candlefix_mock::{MockBehavior, Operation, fixtures};

use crate::helpers::{FUTURES, SPOT, builder, late_arrival, store};

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;
    ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    let (handle, token) = cancel_pair();
    handle.cancel();

    let report = builder(repo)
        .intervals(&[Interval::H1, Interval::D1])
        .build()
        .unwrap()
        .run(&token)
        .await
        .unwrap();

    let totals = report.totals();
    assert_eq!(totals.partitions, 4);
    assert_eq!(totals.cancelled_partitions, 4);
    assert_eq!(totals.scanned, 0);
    assert_eq!(ctl.calls(Operation::Fetch).await, 0);
    assert!(ctl.mutations().await.is_empty());
    assert!(!report.is_clean());
    assert!(report.domain(MarketDomain::Spot).unwrap().failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelling_abandons_a_stalled_read() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;
    ctl.set_behavior(Operation::Fetch, MockBehavior::Hang).await;
    let (handle, token) = cancel_pair();

    let repairer = builder(repo)
        .intervals(&[Interval::H1, Interval::D1])
        .build()
        .unwrap();
    let (report, ()) = tokio::join!(repairer.run(&token), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });
    let report = report.unwrap();

    let spot = report.domain(MarketDomain::Spot).unwrap();
    assert_eq!(spot.stats.cancelled_partitions, 2);
    assert_eq!(ctl.calls(Operation::Fetch).await, 1);
    assert!(ctl.mutations().await.is_empty());
}
