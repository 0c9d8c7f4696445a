//! Ledger snapshots
//!
//! A [`LedgerSnapshot`] is the complete persisted state of a
//! [`RideLedger`](crate::state::RideLedger), encoded with bincode.

use std::fs;
use std::path::Path;
use ethers::types::Address;
use log::debug;
use serde::{Serialize, Deserialize};

use crate::error::{CoreError, Result};
use crate::escrow::EscrowVault;
use crate::models::{Driver, LedgerEvent, Trip, TripCode};
use crate::rating::RatingSubmission;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 2;

/// Full ledger state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Format version
    pub version: u32,

    /// Administrator account
    pub auditor: Address,

    /// Code the next request will receive
    pub next_code: TripCode,

    /// Registered drivers
    pub drivers: Vec<Driver>,

    /// All trip records
    pub trips: Vec<Trip>,

    /// Escrow vault
    pub escrow: EscrowVault,

    /// Applied ratings
    pub ratings: Vec<RatingSubmission>,

    /// Undrained event journal
    pub events: Vec<LedgerEvent>,

    /// Sequence number of the next event
    pub next_event_sequence: u64,
}

impl LedgerSnapshot {
    /// Encode to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: LedgerSnapshot = bincode::deserialize(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::StateError(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Write the snapshot to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path.as_ref(), &bytes)?;
        debug!("Wrote {} byte snapshot to {}", bytes.len(), path.as_ref().display());
        Ok(())
    }

    /// Read a snapshot from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use crate::config::RatingSeedPolicy;

    fn sample() -> LedgerSnapshot {
        let driver = Address::from([1; 20]);
        let mut escrow = EscrowVault::new();
        escrow.deposit(1000, Address::from([2; 20]), 15).unwrap();

        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            auditor: Address::from([0xad; 20]),
            next_code: 1001,
            drivers: vec![Driver::new(driver, 4, RatingSeedPolicy::InitialRating, Utc::now())],
            trips: Vec::new(),
            escrow,
            ratings: Vec::new(),
            events: Vec::new(),
            next_event_sequence: 0,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.snapshot");

        let snapshot = sample();
        snapshot.save(&path).unwrap();
        let loaded = LedgerSnapshot::load(&path).unwrap();

        assert_eq!(loaded.next_code, 1001);
        assert_eq!(loaded.drivers, snapshot.drivers);
        assert_eq!(loaded.escrow, snapshot.escrow);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut snapshot = sample();
        snapshot.version = 99;
        let bytes = snapshot.to_bytes().unwrap();

        assert!(matches!(LedgerSnapshot::from_bytes(&bytes), Err(CoreError::StateError(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            LedgerSnapshot::from_bytes(&[0xff, 0x01]),
            Err(CoreError::BincodeError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LedgerSnapshot::load(dir.path().join("missing")),
            Err(CoreError::IoError(_))
        ));
    }
}
