//! # DCabs Core
//!
//! Escrow ledger for peer-to-peer ride hailing. Customers escrow a fare
//! when they request a registered driver, the driver accepts, and the fare
//! is released only after both sides confirm the trip ended. Locations,
//! destinations and contact details are stored as salted commitments.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod escrow;
pub mod models;
pub mod rating;
pub mod registry;
pub mod service;
pub mod snapshot;
pub mod state;
pub mod utils;

/// Re-export common types for ease of use
pub use config::{HashAlgorithm, LedgerConfig, RatingSeedPolicy};
pub use crypto::{Commitment, CommitmentCodec, Salt, SecureHasher};
pub use error::{CoreError, Result};
pub use models::{Amount, CommitmentField, Driver, LedgerEvent, LedgerEventKind, Party, Trip, TripCode, TripStatus};
pub use service::{LedgerHandle, LedgerService};
pub use snapshot::LedgerSnapshot;
pub use state::{create_shared_ledger, Confirmation, RideLedger, SharedLedger};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a domain-separated secure hash of multiple inputs
pub fn secure_hash_multiple(domain: &str, data: &[&[u8]]) -> [u8; 32] {
    crypto::secure_hash_multiple(domain, data)
}
