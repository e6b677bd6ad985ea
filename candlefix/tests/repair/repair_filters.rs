use candlefix::{CancelToken, Interval, MarketDomain, PartitionKey};
use candlefix_mock::{Operation, fixtures};

use crate::helpers::{FUTURES, SPOT, builder, late_arrival, store};

#[tokio::test]
async fn symbol_filter_limits_the_run() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;
    ctl.insert(SPOT, late_arrival("ETH/USDT")).await;

    let report = builder(repo)
        .intervals(&[Interval::H1])
        .symbols(["ETH/USDT", "DOGE/USDT"])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let spot = report.domain(MarketDomain::Spot).unwrap();
    assert_eq!(spot.stats.partitions, 1);
    assert_eq!(spot.stats.duplicates_removed, 1);
    assert_eq!(
        ctl.rows(SPOT, &PartitionKey::new("BTC/USDT", Interval::H1))
            .await
            .len(),
        7
    );
    assert_eq!(
        ctl.rows(SPOT, &PartitionKey::new("ETH/USDT", Interval::H1))
            .await
            .len(),
        6
    );
}

#[tokio::test]
async fn interval_subset_leaves_other_intervals_alone() {
    let (repo, ctl) = store().await;
    ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    ctl.insert(FUTURES, fixtures::split_hour()).await;

    let report = builder(repo)
        .intervals(&[Interval::D1, Interval::W1, Interval::D1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let futures = report.domain(MarketDomain::Futures).unwrap();
    // two symbols, two distinct intervals
    assert_eq!(futures.stats.partitions, 4);
    assert_eq!(futures.stats.open_fixed, 1);
    assert_eq!(futures.stats.duplicates_removed, 0);
    assert_eq!(ctl.calls(Operation::Fetch).await, 4);
    assert_eq!(
        ctl.rows(FUTURES, &PartitionKey::new("BTC/USDT", Interval::H1))
            .await
            .len(),
        3
    );
}

#[tokio::test]
async fn parallel_workers_reach_the_same_state() {
    let (seq_repo, seq_ctl) = store().await;
    let (par_repo, par_ctl) = store().await;
    let symbols = ["ADA/USDT", "BTC/USDT", "ETH/USDT", "SOL/USDT", "XRP/USDT"];
    for ctl in [&seq_ctl, &par_ctl] {
        for s in symbols {
            ctl.insert(SPOT, late_arrival(s)).await;
        }
        ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    }

    let seq = builder(seq_repo)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();
    let par = builder(par_repo)
        .concurrency(8)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    assert_eq!(seq.totals(), par.totals());
    assert_eq!(par.totals().duplicates_removed, 5);
    // updatedAt differs per run
    let values = |rows: Vec<candlefix::Candle>| {
        rows.into_iter()
            .map(|c| (c.created_at, c.open, c.high, c.low, c.close, c.volume))
            .collect::<Vec<_>>()
    };
    for s in symbols {
        let p = PartitionKey::new(s, Interval::H1);
        assert_eq!(
            values(seq_ctl.rows(SPOT, &p).await),
            values(par_ctl.rows(SPOT, &p).await)
        );
    }
}
