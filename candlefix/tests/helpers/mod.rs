// Shared fixtures for the repair integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::TimeDelta;
use rust_decimal::Decimal;

use candlefix::{Candle, CandleRepository, Interval, Repairer, RepairerBuilder};
use candlefix_mock::fixtures::{candle, clean_series};
use candlefix_mock::{InMemoryRepository, MockController, Mutation};

pub const SPOT: &str = "ecosystem";
pub const FUTURES: &str = "futures";

/// Fresh in-memory store with both domain keyspaces created.
pub async fn store() -> (Arc<dyn CandleRepository>, MockController) {
    let (repo, ctl) = InMemoryRepository::new_with_controller("mem");
    ctl.create_keyspace(SPOT).await;
    ctl.create_keyspace(FUTURES).await;
    (repo, ctl)
}

pub fn builder(repo: Arc<dyn CandleRepository>) -> RepairerBuilder {
    Repairer::builder().with_repository(repo)
}

/// Six hourly candles for `symbol` plus a late arrival inside the 02:00 bucket.
///
/// The late row drags the 02:00 close to 150, so the 03:00 open (103) must be
/// chained to it. Expected repair: one duplicate removed, one open fixed, two
/// rows updated.
pub fn late_arrival(symbol: &str) -> Vec<Candle> {
    let mut rows = clean_series(symbol, Interval::H1, 6);
    let late_at = rows[2].created_at + TimeDelta::minutes(30);
    rows.push(candle(
        symbol,
        Interval::H1,
        late_at,
        Decimal::from(200),
        Decimal::from(210),
        Decimal::from(101),
        Decimal::from(150),
        Decimal::from(4),
    ));
    rows
}

pub fn updates(mutations: &[Mutation]) -> Vec<&Candle> {
    mutations
        .iter()
        .filter_map(|m| match m {
            Mutation::Update { candle, .. } => Some(candle),
            Mutation::Delete { .. } => None,
        })
        .collect()
}

pub fn deletes(mutations: &[Mutation]) -> usize {
    mutations
        .iter()
        .filter(|m| matches!(m, Mutation::Delete { .. }))
        .count()
}
