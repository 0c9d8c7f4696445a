//! End-to-end ride flows against the public API

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use dcabs_core::utils::ManualClock;
use dcabs_core::{
    CommitmentField, Confirmation, CoreError, LedgerConfig, LedgerEventKind, LedgerService, Party, RideLedger,
    Salt, TripStatus,
};
use ethers::types::Address;
use tempfile::tempdir;

fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

#[test]
fn two_drivers_many_trips() -> Result<()> {
    let config = LedgerConfig::testing();
    config.init_logging();

    let auditor = addr(0xad);
    let (alice, bob) = (addr(1), addr(2));
    let mut ledger = RideLedger::new(config, auditor)?;
    ledger.register_driver(&auditor, alice, 0)?;
    ledger.register_driver(&auditor, bob, 0)?;
    assert!(matches!(
        ledger.register_driver(&auditor, alice, 0),
        Err(CoreError::AlreadyRegistered(_))
    ));

    let salt = Salt::random();
    let pickup = ledger.codec().commit(b"Alexanderplatz", &salt);
    let dropoff = ledger.codec().commit(b"Tegel", &salt);

    let ratings = [(alice, addr(10), 5u8), (alice, addr(11), 2), (bob, addr(12), 4), (alice, addr(13), 0)];
    for (driver, customer, rating) in ratings {
        let code = ledger.set_pickup(&customer, pickup, dropoff, driver, 25)?;
        ledger.accept_trip(&driver, pickup, &customer)?;
        ledger.end_trip(&customer, code, rating)?;
        ledger.end_trip(&driver, code, 0)?;
        assert_eq!(ledger.trip(code).map(|t| t.status), Some(TripStatus::Completed));
    }

    assert_eq!(ledger.next_code(), 1004);
    assert_eq!(ledger.balance_of(&alice), 75);
    assert_eq!(ledger.balance_of(&bob), 25);
    assert_eq!(ledger.escrowed_total(), 0);

    // (5 + 2) / 2 floors to 3; the unrated trip does not count
    assert_eq!(ledger.get_driver_rating(&auditor, &alice)?, 3);
    assert_eq!(ledger.get_driver_rating(&auditor, &bob)?, 4);
    assert_eq!(ledger.rating_history(&auditor, &alice)?.len(), 2);

    let completed = ledger
        .events()
        .iter()
        .filter(|e| matches!(e.kind, LedgerEventKind::TripCompleted { .. }))
        .count();
    assert_eq!(completed, 4);
    Ok(())
}

#[test]
fn abandoned_trip_is_refunded_after_timeout() -> Result<()> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let auditor = addr(0xad);
    let (driver, customer) = (addr(1), addr(2));
    let mut ledger = RideLedger::with_clock(LedgerConfig::testing(), auditor, clock.clone())?;
    ledger.register_driver(&auditor, driver, 0)?;

    let salt = Salt::random();
    let contact = ledger.codec().commit(b"+49 30 1234567", &salt);
    let code = ledger.set_pickup(&customer, contact, contact, driver, 40)?;
    ledger.accept_trip(&driver, contact, &customer)?;

    assert_eq!(
        ledger.end_trip(&driver, code, 0)?,
        Confirmation::Pending { awaiting: Party::Customer }
    );
    assert!(ledger.verify_trip_commitment(&driver, code, CommitmentField::Contact, b"+49 30 1234567", &salt)?);

    clock.advance(Duration::seconds(30));
    assert!(matches!(ledger.cancel_trip(&driver, code), Err(CoreError::TimeoutNotReached { .. })));

    clock.advance(Duration::seconds(30));
    assert_eq!(ledger.cancel_trip(&driver, code)?, 40);
    assert_eq!(ledger.balance_of(&customer), 40);
    assert_eq!(ledger.balance_of(&driver), 0);
    Ok(())
}

#[test]
fn snapshot_file_restores_ledger() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("dcabs.snapshot");
    let auditor = addr(0xad);
    let (driver, customer) = (addr(1), addr(2));

    let mut ledger = RideLedger::new(LedgerConfig::testing(), auditor)?;
    ledger.register_driver(&auditor, driver, 0)?;
    let c = ledger.codec().commit(b"x", &Salt::random());
    let code = ledger.set_pickup(&customer, c, c, driver, 10)?;
    ledger.accept_trip(&driver, c, &customer)?;
    ledger.end_trip(&driver, code, 0)?;
    ledger.save_snapshot(&path)?;

    let mut restored = RideLedger::load_snapshot(&path, LedgerConfig::testing())?;
    assert_eq!(restored.escrowed_total(), 10);
    assert!(matches!(
        restored.end_trip(&driver, code, 0),
        Err(CoreError::AlreadyConfirmed { party: Party::Driver, .. })
    ));
    assert!(matches!(
        restored.end_trip(&customer, code, 1)?,
        Confirmation::Settled { payout: 10, .. }
    ));
    assert_eq!(restored.set_pickup(&customer, c, c, driver, 10)?, 1001);
    Ok(())
}

#[tokio::test]
async fn service_serializes_competing_customers() -> Result<()> {
    let auditor = addr(0xad);
    let driver = addr(1);
    let ledger = RideLedger::new(LedgerConfig::testing(), auditor)?;
    let (handle, task) = LedgerService::spawn(ledger);
    handle.register_driver(auditor, driver, 0).await?;

    let c = dcabs_core::Commitment::from_bytes([4; 32]);
    let first = handle.set_pickup(addr(20), c, c, driver, 5).await?;
    let second = handle.set_pickup(addr(21), c, c, driver, 5).await?;
    assert_eq!((first, second), (1000, 1001));

    handle.accept_trip(driver, c, addr(21)).await?;
    assert!(matches!(
        handle.accept_trip(driver, c, addr(21)).await,
        Err(CoreError::NoSuchRequest(_))
    ));
    assert_eq!(handle.cancel_trip(addr(20), first).await?, 5);

    drop(handle);
    let ledger = task.await?;
    assert_eq!(ledger.escrowed_total(), 5);
    assert_eq!(ledger.trip(second).map(|t| t.status), Some(TripStatus::Accepted));
    Ok(())
}
