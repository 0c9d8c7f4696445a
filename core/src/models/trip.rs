//! Trip record and its lifecycle state machine
//!
//! A trip moves `Requested -> Accepted -> Completed`, or to `Cancelled` from
//! either non-terminal state. Every transition is a guarded method on
//! [`Trip`]; callers never flip status fields directly.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Serialize, Deserialize};

use crate::crypto::{self, Commitment};
use crate::error::{CoreError, Result};
use super::{domains, Amount, TripCode};

/// Lifecycle state of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStatus {
    /// Customer has requested a driver and escrowed the fare
    Requested,

    /// Driver has accepted the request
    Accepted,

    /// Both parties confirmed; fare released to the driver
    Completed,

    /// Trip aborted; fare refunded to the customer
    Cancelled,
}

/// Side of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    /// The driver named in the request
    Driver,

    /// The account that requested the trip
    Customer,
}

/// Commitment slots a participant can reveal against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentField {
    /// Pickup location
    Location,

    /// Destination
    Destination,

    /// Driver contact, set at acceptance
    Contact,
}

/// A single ride from request to settlement
#[derive(Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Confirmation code, unique for the lifetime of the ledger
    pub code: TripCode,

    /// Requesting account
    pub customer: Address,

    /// Requested driver
    pub driver: Address,

    /// Commitment to the pickup location
    pub location_commitment: Commitment,

    /// Commitment to the destination
    pub destination_commitment: Commitment,

    /// Commitment to the driver's contact details
    pub contact_commitment: Option<Commitment>,

    /// Escrowed fare
    pub fare: Amount,

    /// Current state
    pub status: TripStatus,

    /// Driver has confirmed the trip ended
    pub driver_confirmed: bool,

    /// Customer has confirmed the trip ended
    pub customer_confirmed: bool,

    /// Customer rating, 0 when none was given
    pub submitted_rating: u8,

    /// Request time
    pub requested_at: DateTime<Utc>,

    /// Acceptance time
    pub accepted_at: Option<DateTime<Utc>>,

    /// Time of the last accepted call touching this trip
    pub last_activity: DateTime<Utc>,

    /// Completion or cancellation time
    pub settled_at: Option<DateTime<Utc>>,
}

impl Debug for Trip {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Trip")
            .field("code", &self.code)
            .field("customer", &self.customer)
            .field("driver", &self.driver)
            .field("fare", &self.fare)
            .field("status", &self.status)
            .field("driver_confirmed", &self.driver_confirmed)
            .field("customer_confirmed", &self.customer_confirmed)
            .finish()
    }
}

impl Trip {
    /// Create a trip in the `Requested` state
    pub fn new(
        code: TripCode,
        customer: Address,
        driver: Address,
        location_commitment: Commitment,
        destination_commitment: Commitment,
        fare: Amount,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Trip {
            code,
            customer,
            driver,
            location_commitment,
            destination_commitment,
            contact_commitment: None,
            fare,
            status: TripStatus::Requested,
            driver_confirmed: false,
            customer_confirmed: false,
            submitted_rating: 0,
            requested_at,
            accepted_at: None,
            last_activity: requested_at,
            settled_at: None,
        }
    }

    /// Which side `account` is on, if any
    pub fn party_of(&self, account: &Address) -> Option<Party> {
        if *account == self.driver {
            Some(Party::Driver)
        } else if *account == self.customer {
            Some(Party::Customer)
        } else {
            None
        }
    }

    /// Whether the trip reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Whether both parties have confirmed
    pub fn is_fully_confirmed(&self) -> bool {
        self.driver_confirmed && self.customer_confirmed
    }

    /// Whether `party` has already confirmed
    pub fn has_confirmed(&self, party: Party) -> bool {
        match party {
            Party::Driver => self.driver_confirmed,
            Party::Customer => self.customer_confirmed,
        }
    }

    /// Rating to forward to the rating ledger on settlement
    pub fn rating_to_record(&self) -> Option<u8> {
        (self.submitted_rating > 0).then_some(self.submitted_rating)
    }

    /// Stored commitment for `field`
    pub fn commitment(&self, field: CommitmentField) -> Option<&Commitment> {
        match field {
            CommitmentField::Location => Some(&self.location_commitment),
            CommitmentField::Destination => Some(&self.destination_commitment),
            CommitmentField::Contact => self.contact_commitment.as_ref(),
        }
    }

    /// Fail unless the trip is waiting for confirmations
    pub fn ensure_accepted(&self) -> Result<()> {
        match self.status {
            TripStatus::Accepted => Ok(()),
            TripStatus::Completed => Err(CoreError::AlreadyCompleted(self.code)),
            TripStatus::Requested | TripStatus::Cancelled => Err(CoreError::UnknownCode(self.code)),
        }
    }

    /// `Requested -> Accepted`
    pub fn accept(&mut self, contact_commitment: Commitment, now: DateTime<Utc>) -> Result<()> {
        if self.status != TripStatus::Requested {
            return Err(CoreError::NoSuchRequest(self.customer));
        }

        self.contact_commitment = Some(contact_commitment);
        self.status = TripStatus::Accepted;
        self.accepted_at = Some(now);
        self.last_activity = now;
        Ok(())
    }

    /// Record one party's end-of-trip confirmation
    ///
    /// Only the customer's rating is kept. Returns whether both sides have
    /// now confirmed.
    pub fn confirm(&mut self, party: Party, rating: u8, now: DateTime<Utc>) -> Result<bool> {
        self.ensure_accepted()?;

        if self.has_confirmed(party) {
            return Err(CoreError::AlreadyConfirmed { code: self.code, party });
        }

        match party {
            Party::Driver => self.driver_confirmed = true,
            Party::Customer => {
                self.customer_confirmed = true;
                self.submitted_rating = rating;
            }
        }
        self.last_activity = now;

        Ok(self.is_fully_confirmed())
    }

    /// `Accepted -> Completed`, only once both sides confirmed
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_accepted()?;

        if !self.is_fully_confirmed() {
            return Err(CoreError::StateError(format!(
                "trip {} cannot complete without both confirmations",
                self.code
            )));
        }

        self.status = TripStatus::Completed;
        self.settled_at = Some(now);
        self.last_activity = now;
        Ok(())
    }

    /// `Requested | Accepted -> Cancelled`
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            TripStatus::Requested | TripStatus::Accepted => {
                self.status = TripStatus::Cancelled;
                self.settled_at = Some(now);
                self.last_activity = now;
                Ok(())
            }
            TripStatus::Completed => Err(CoreError::AlreadyCompleted(self.code)),
            TripStatus::Cancelled => Err(CoreError::NotCancellable(self.code)),
        }
    }

    /// Calculate the hash of the trip with domain separation
    pub fn calculate_hash(&self) -> [u8; 32] {
        let code_bytes = self.code.to_be_bytes();
        let fare_bytes = self.fare.to_be_bytes();
        let status_bytes = [self.status as u8];
        let flags = [self.driver_confirmed as u8, self.customer_confirmed as u8, self.submitted_rating];
        let contact: &[u8] = match &self.contact_commitment {
            Some(commitment) => commitment.as_bytes(),
            None => &[],
        };
        let requested_bytes = self.requested_at.timestamp_millis().to_be_bytes();

        crypto::secure_hash_multiple(
            domains::TRIP,
            &[
                &code_bytes,
                self.customer.as_bytes(),
                self.driver.as_bytes(),
                self.location_commitment.as_bytes(),
                self.destination_commitment.as_bytes(),
                contact,
                &fare_bytes,
                &status_bytes,
                &flags,
                &requested_bytes,
            ],
        )
    }
}
