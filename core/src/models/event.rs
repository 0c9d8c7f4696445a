//! Append-only journal of ledger state changes

use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::crypto;
use super::{domains, Amount, Party, TripCode};

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    /// Administrator onboarded a driver
    DriverRegistered {
        /// Driver account
        driver: Address,
    },

    /// Customer requested a trip and escrowed the fare
    TripRequested {
        /// Assigned confirmation code
        code: TripCode,
        /// Requesting account
        customer: Address,
        /// Requested driver
        driver: Address,
        /// Escrowed amount
        fare: Amount,
    },

    /// Driver accepted a request
    TripAccepted {
        /// Trip code
        code: TripCode,
        /// Accepting driver
        driver: Address,
    },

    /// One side confirmed the end of a trip
    TripConfirmed {
        /// Trip code
        code: TripCode,
        /// Confirming side
        party: Party,
    },

    /// Both sides confirmed; fare paid out
    TripCompleted {
        /// Trip code
        code: TripCode,
        /// Paid driver
        driver: Address,
        /// Released amount
        fare: Amount,
        /// Rating forwarded to the rating ledger
        rating: Option<u8>,
        /// Hash of the final trip record
        trip_hash: [u8; 32],
    },

    /// Trip aborted; fare refunded
    TripCancelled {
        /// Trip code
        code: TripCode,
        /// Account that cancelled
        cancelled_by: Address,
        /// Refunded amount
        refunded: Amount,
    },
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unique event id
    pub id: Uuid,

    /// Position in the journal, starting at 0
    pub sequence: u64,

    /// Time the operation was applied
    pub timestamp: DateTime<Utc>,

    /// Event payload
    pub kind: LedgerEventKind,
}

impl LedgerEvent {
    /// Create a journal entry with a fresh id
    pub fn new(sequence: u64, timestamp: DateTime<Utc>, kind: LedgerEventKind) -> Self {
        LedgerEvent {
            id: Uuid::new_v4(),
            sequence,
            timestamp,
            kind,
        }
    }

    /// Trip this event concerns, if any
    pub fn trip_code(&self) -> Option<TripCode> {
        match &self.kind {
            LedgerEventKind::DriverRegistered { .. } => None,
            LedgerEventKind::TripRequested { code, .. }
            | LedgerEventKind::TripAccepted { code, .. }
            | LedgerEventKind::TripConfirmed { code, .. }
            | LedgerEventKind::TripCompleted { code, .. }
            | LedgerEventKind::TripCancelled { code, .. } => Some(*code),
        }
    }

    /// Calculate the hash of the event with domain separation
    pub fn calculate_hash(&self) -> [u8; 32] {
        let sequence_bytes = self.sequence.to_be_bytes();
        let timestamp_bytes = self.timestamp.timestamp_millis().to_be_bytes();
        let kind_json = serde_json::to_vec(&self.kind).unwrap_or_default();

        crypto::secure_hash_multiple(
            domains::EVENT,
            &[self.id.as_bytes(), &sequence_bytes, &timestamp_bytes, &kind_json],
        )
    }
}
