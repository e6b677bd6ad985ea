use candlefix::{DomainConfig, Interval, MarketDomain, RepairConfig, RepairError, Repairer};

use crate::helpers::{builder, store};

#[test]
fn missing_repository_is_rejected() {
    let err = Repairer::builder().build().err().unwrap();
    assert!(matches!(err, RepairError::InvalidArg(_)));
}

#[tokio::test]
async fn zero_concurrency_is_rejected() {
    let (repo, _) = store().await;
    let err = builder(repo).concurrency(0).build().err().unwrap();
    assert!(matches!(err, RepairError::InvalidArg(_)));
}

#[tokio::test]
async fn empty_interval_subset_is_rejected() {
    let (repo, _) = store().await;
    let err = builder(repo).intervals(&[]).build().err().unwrap();
    assert!(matches!(err, RepairError::InvalidArg(_)));
}

#[tokio::test]
async fn shared_keyspace_is_rejected() {
    let (repo, _) = store().await;
    let err = builder(repo)
        .domains(vec![
            DomainConfig::new(MarketDomain::Spot, "candles"),
            DomainConfig::new(MarketDomain::Futures, "candles"),
        ])
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RepairError::InvalidArg(_)));
}

#[tokio::test]
async fn defaults_cover_both_domains_and_every_interval() {
    let (repo, _) = store().await;
    let repairer = builder(repo).build().unwrap();
    let cfg = repairer.config();
    assert_eq!(cfg, &RepairConfig::default());
    assert_eq!(cfg.domains[0], DomainConfig::new(MarketDomain::Spot, "ecosystem"));
    assert_eq!(cfg.domains[1], DomainConfig::new(MarketDomain::Futures, "futures"));
    assert_eq!(cfg.intervals, Interval::ALL.to_vec());
    assert_eq!(cfg.concurrency, 1);
    assert!(!cfg.dry_run);
    assert!(!cfg.guard_writes);
}

#[tokio::test]
async fn repeated_intervals_are_collapsed() {
    let (repo, _) = store().await;
    let repairer = builder(repo)
        .intervals(&[Interval::H1, Interval::M5, Interval::H1])
        .build()
        .unwrap();
    assert_eq!(repairer.config().intervals, vec![Interval::H1, Interval::M5]);
}
