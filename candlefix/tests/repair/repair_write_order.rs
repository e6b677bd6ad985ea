use std::collections::HashSet;

use candlefix::{CancelToken, Interval};
use candlefix_mock::Mutation;

use crate::helpers::{SPOT, builder, late_arrival, store};

#[tokio::test]
async fn updates_land_before_deletes_and_never_twice() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;

    builder(repo)
        .intervals(&[Interval::H1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let mutations = ctl.mutations().await;
    let first_delete = mutations
        .iter()
        .position(|m| matches!(m, Mutation::Delete { .. }))
        .unwrap();
    assert!(
        mutations[first_delete..]
            .iter()
            .all(|m| matches!(m, Mutation::Delete { .. })),
        "an update followed a delete: {mutations:?}"
    );

    let mut seen = HashSet::new();
    for m in &mutations {
        if let Mutation::Update { keyspace, candle } = m {
            assert_eq!(keyspace, SPOT);
            assert!(seen.insert(candle.key()), "{} updated twice", candle.key());
        }
    }
}

#[tokio::test]
async fn written_rows_carry_a_fresh_updated_at() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;

    let report = builder(repo)
        .intervals(&[Interval::H1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    for m in ctl.mutations().await {
        if let Mutation::Update { candle, .. } = m {
            assert_eq!(candle.updated_at, Some(report.started_at));
        }
    }
}
