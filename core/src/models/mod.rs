//! Data models for the ride ledger
//!
//! This module provides data structures for drivers, trips and the
//! ledger's event journal.

mod driver;
mod event;
mod trip;

pub use driver::Driver;
pub use event::{LedgerEvent, LedgerEventKind};
pub use trip::{CommitmentField, Party, Trip, TripStatus};

/// Confirmation code identifying a trip
pub type TripCode = u64;

/// Escrowed value, in the smallest unit of the settlement currency
pub type Amount = u128;

/// Domain constants for data models
pub mod domains {
    /// Domain for location, destination and contact commitments
    pub const COMMITMENT: &str = "DCABS_COMMITMENT";

    /// Domain for trip records
    pub const TRIP: &str = "DCABS_TRIP";

    /// Domain for journal events
    pub const EVENT: &str = "DCABS_EVENT";
}
