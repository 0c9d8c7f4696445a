//! Error types for the core crate
//!
//! Every public ledger operation returns [`CoreError`] on failure. A failed
//! operation never leaves partial writes behind.

use ethers::types::Address;
use thiserror::Error;
use std::io;

use crate::models::{Party, TripCode};

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller is not the administrator
    #[error("Unauthorized: {0:?} is not the administrator")]
    Unauthorized(Address),

    /// Driver already has a registry record
    #[error("Driver already registered: {0:?}")]
    AlreadyRegistered(Address),

    /// Driver lookup by the administrator failed
    #[error("Driver not found: {0:?}")]
    NotFound(Address),

    /// Ride request names a driver that is not registered
    #[error("Requested driver is not registered: {0:?}")]
    DriverNotFound(Address),

    /// Ride request carries no deposit
    #[error("Fare must be greater than zero")]
    ZeroFare,

    /// No outstanding request for the given customer
    #[error("No outstanding ride request for customer {0:?}")]
    NoSuchRequest(Address),

    /// Caller is not the driver named in the request
    #[error("Trip {code} was not requested from {caller:?}")]
    NotTargetDriver {
        /// Trip code
        code: TripCode,
        /// Rejected caller
        caller: Address,
    },

    /// Code does not name an accepted trip
    #[error("Unknown confirmation code: {0}")]
    UnknownCode(TripCode),

    /// Caller is neither the driver nor the customer of the trip
    #[error("{caller:?} is not a participant of trip {code}")]
    NotParticipant {
        /// Trip code
        code: TripCode,
        /// Rejected caller
        caller: Address,
    },

    /// Party already confirmed this trip
    #[error("Trip {code} already confirmed by the {party:?}")]
    AlreadyConfirmed {
        /// Trip code
        code: TripCode,
        /// Party that confirmed twice
        party: Party,
    },

    /// Trip has settled and accepts no further transitions
    #[error("Trip {0} is already completed")]
    AlreadyCompleted(TripCode),

    /// Rating outside the accepted range
    #[error("Invalid rating {rating}, expected 0..={max}")]
    InvalidRating {
        /// Submitted rating
        rating: u8,
        /// Highest accepted rating
        max: u8,
    },

    /// Malformed ride request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Customer already holds an outstanding request
    #[error("Customer {customer:?} already has outstanding request {code}")]
    RequestPending {
        /// Customer account
        customer: Address,
        /// Code of the outstanding request
        code: TripCode,
    },

    /// Trip is in a state that cannot be cancelled
    #[error("Trip {0} cannot be cancelled")]
    NotCancellable(TripCode),

    /// Inactivity period has not elapsed yet
    #[error("Trip {code} can be cancelled in {remaining_secs}s")]
    TimeoutNotReached {
        /// Trip code
        code: TripCode,
        /// Seconds left until cancellation is allowed
        remaining_secs: i64,
    },

    /// Escrow bookkeeping invariant violated
    #[error("Escrow error: {0}")]
    Escrow(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Bincode error
    #[error("Bincode error: {0}")]
    BincodeError(#[from] bincode::Error),

    /// Hex decoding error
    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// State management error
    #[error("State management error: {0}")]
    StateError(String),

    /// Ledger service is no longer running
    #[error("Ledger service error: {0}")]
    ServiceError(String),
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, CoreError>;

/// Convert a string error to a ConfigError
pub fn to_config_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::ConfigError(err.to_string())
}

/// Convert a string error to a ServiceError
pub fn to_service_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::ServiceError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::IoError(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::JsonError(_)));

        let hex_err = hex::decode("zz").unwrap_err();
        let err: CoreError = hex_err.into();
        assert!(matches!(err, CoreError::HexError(_)));

        match to_config_error("bad timeout") {
            CoreError::ConfigError(msg) => assert_eq!(msg, "bad timeout"),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownCode(1000);
        assert_eq!(err.to_string(), "Unknown confirmation code: 1000");

        let err = CoreError::InvalidRating { rating: 9, max: 5 };
        assert_eq!(err.to_string(), "Invalid rating 9, expected 0..=5");

        let err = CoreError::AlreadyConfirmed { code: 1001, party: Party::Driver };
        assert_eq!(err.to_string(), "Trip 1001 already confirmed by the Driver");

        let err = CoreError::ZeroFare;
        assert_eq!(err.to_string(), "Fare must be greater than zero");
    }
}
