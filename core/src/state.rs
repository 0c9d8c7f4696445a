//! Ride ledger state
//!
//! [`RideLedger`] owns the driver registry, every trip record, the escrow
//! vault, the rating ledger and the event journal. Each public operation
//! checks all of its preconditions before the first write, so an `Err`
//! return leaves the ledger exactly as it was.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::{Arc, RwLock};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use log::{debug, info, warn};

use crate::config::{LedgerConfig, RatingSeedPolicy};
use crate::crypto::{Commitment, CommitmentCodec, Salt};
use crate::error::{CoreError, Result};
use crate::escrow::EscrowVault;
use crate::models::{
    Amount, CommitmentField, Driver, LedgerEvent, LedgerEventKind, Party, Trip, TripCode, TripStatus,
};
use crate::rating::{RatingLedger, RatingSubmission};
use crate::registry::DriverRegistry;
use crate::snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
use crate::utils::{Clock, SystemClock};

/// Result of an `end_trip` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Confirmation recorded; the other side has not confirmed yet
    Pending {
        /// Side still to confirm
        awaiting: Party,
    },

    /// Both sides confirmed and the trip settled
    Settled {
        /// Paid driver
        driver: Address,
        /// Released fare
        payout: Amount,
        /// Rating applied to the driver
        rating: Option<u8>,
    },
}

/// The ride-hailing escrow ledger
pub struct RideLedger {
    /// Configuration
    config: LedgerConfig,

    /// Commitment codec for reveals
    codec: CommitmentCodec,

    /// Time source
    clock: Arc<dyn Clock>,

    /// Inactivity period before an accepted trip may be cancelled
    confirmation_timeout: chrono::Duration,

    /// Code handed to the next request
    next_code: TripCode,

    /// Driver registry
    registry: DriverRegistry,

    /// Trip records by code
    trips: BTreeMap<TripCode, Trip>,

    /// Outstanding `Requested` trip per customer
    pending: HashMap<Address, TripCode>,

    /// Escrowed fares and settled balances
    escrow: EscrowVault,

    /// Applied ratings
    ratings: RatingLedger,

    /// Undrained part of the event journal
    events: Vec<LedgerEvent>,

    /// Sequence number of the next event
    next_sequence: u64,
}

impl Debug for RideLedger {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RideLedger")
            .field("auditor", &self.registry.auditor())
            .field("next_code", &self.next_code)
            .field("drivers", &self.registry.driver_count())
            .field("trips", &self.trips.len())
            .field("escrowed", &self.escrow.total_held())
            .finish()
    }
}

impl RideLedger {
    /// Create an empty ledger administered by `auditor`
    pub fn new(config: LedgerConfig, auditor: Address) -> Result<Self> {
        Self::with_clock(config, auditor, Arc::new(SystemClock))
    }

    /// Create an empty ledger with a custom time source
    pub fn with_clock(config: LedgerConfig, auditor: Address, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let confirmation_timeout = config.confirmation_timeout()?;

        info!(
            "Creating ride ledger (auditor {:?}, first code {}, {:?} commitments)",
            auditor, config.trip.base_confirmation_code, config.commitment.hash_algorithm
        );

        Ok(RideLedger {
            codec: CommitmentCodec::from_config(&config.commitment),
            clock,
            confirmation_timeout,
            next_code: config.trip.base_confirmation_code,
            registry: DriverRegistry::new(auditor, config.trip.rating_seed_policy),
            trips: BTreeMap::new(),
            pending: HashMap::new(),
            escrow: EscrowVault::new(),
            ratings: RatingLedger::new(),
            events: Vec::new(),
            next_sequence: 0,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Administrator account
    pub fn auditor(&self) -> Address {
        self.registry.auditor()
    }

    /// Codec used for commitment reveals
    pub fn codec(&self) -> &CommitmentCodec {
        &self.codec
    }

    /// Code the next request will receive
    pub fn next_code(&self) -> TripCode {
        self.next_code
    }

    fn record_event(&mut self, timestamp: DateTime<Utc>, kind: LedgerEventKind) {
        self.events.push(LedgerEvent::new(self.next_sequence, timestamp, kind));
        self.next_sequence += 1;
    }

    // ---- Driver registry ----

    /// Register a driver (administrator only)
    ///
    /// When the seed counts as a first rating it must lie on the rating scale.
    pub fn register_driver(&mut self, caller: &Address, driver: Address, rating_seed: u64) -> Result<()> {
        self.registry.ensure_auditor(caller)?;
        let max = self.config.trip.max_rating;
        if self.config.trip.rating_seed_policy == RatingSeedPolicy::InitialRating && rating_seed > max as u64 {
            return Err(CoreError::InvalidRequest(format!(
                "rating seed {} is outside 0..={}",
                rating_seed, max
            )));
        }

        let now = self.clock.now();
        self.registry.register_driver(caller, driver, rating_seed, now)?;
        self.record_event(now, LedgerEventKind::DriverRegistered { driver });
        Ok(())
    }

    /// Number of registered drivers
    pub fn driver_count(&self) -> usize {
        self.registry.driver_count()
    }

    /// Integer average rating of a driver (administrator only)
    ///
    /// A driver without ratings reads as 0.
    pub fn get_driver_rating(&self, caller: &Address, driver: &Address) -> Result<u64> {
        self.registry.get_driver_rating(caller, driver)
    }

    /// Full driver record (administrator only)
    pub fn driver_summary(&self, caller: &Address, driver: &Address) -> Result<Driver> {
        self.registry.driver_summary(caller, driver).cloned()
    }

    /// Ratings applied to a driver, oldest first (administrator only)
    pub fn rating_history(&self, caller: &Address, driver: &Address) -> Result<Vec<RatingSubmission>> {
        self.registry.driver_summary(caller, driver)?;
        Ok(self.ratings.submissions_for(driver).cloned().collect())
    }

    // ---- Trip lifecycle ----

    /// Request a ride from `driver`, escrowing `fare`
    ///
    /// Returns the trip's confirmation code.
    pub fn set_pickup(
        &mut self,
        caller: &Address,
        location_commitment: Commitment,
        destination_commitment: Commitment,
        driver: Address,
        fare: Amount,
    ) -> Result<TripCode> {
        if !self.registry.is_registered(&driver) {
            return Err(CoreError::DriverNotFound(driver));
        }
        if fare == 0 {
            return Err(CoreError::ZeroFare);
        }
        if *caller == driver {
            return Err(CoreError::InvalidRequest("a driver cannot hire themselves".to_string()));
        }
        if let Some(code) = self.pending.get(caller) {
            return Err(CoreError::RequestPending { customer: *caller, code: *code });
        }

        let code = self.next_code;
        let next_code = code
            .checked_add(1)
            .ok_or_else(|| CoreError::StateError("confirmation codes exhausted".to_string()))?;
        let now = self.clock.now();

        self.escrow.deposit(code, *caller, fare)?;
        self.next_code = next_code;
        self.trips.insert(
            code,
            Trip::new(code, *caller, driver, location_commitment, destination_commitment, fare, now),
        );
        self.pending.insert(*caller, code);
        self.record_event(now, LedgerEventKind::TripRequested { code, customer: *caller, driver, fare });

        info!("Trip {} requested by {:?} from driver {:?} (fare {})", code, caller, driver, fare);
        Ok(code)
    }

    /// Accept the outstanding request of `customer`
    ///
    /// Returns the accepted trip's code.
    pub fn accept_trip(
        &mut self,
        caller: &Address,
        contact_commitment: Commitment,
        customer: &Address,
    ) -> Result<TripCode> {
        let code = *self
            .pending
            .get(customer)
            .ok_or(CoreError::NoSuchRequest(*customer))?;
        let now = self.clock.now();

        let trip = self
            .trips
            .get_mut(&code)
            .ok_or_else(|| CoreError::StateError(format!("pending trip {} has no record", code)))?;
        if trip.driver != *caller {
            return Err(CoreError::NotTargetDriver { code, caller: *caller });
        }
        trip.accept(contact_commitment, now)?;

        self.pending.remove(customer);
        self.record_event(now, LedgerEventKind::TripAccepted { code, driver: *caller });

        info!("Trip {} accepted by driver {:?}", code, caller);
        Ok(code)
    }

    /// Confirm the end of trip `code`
    ///
    /// The driver's `rating` argument is ignored. Once both sides have
    /// confirmed, the fare is released to the driver, a non-zero customer
    /// rating is applied and the trip completes, all in this call.
    pub fn end_trip(&mut self, caller: &Address, code: TripCode, rating: u8) -> Result<Confirmation> {
        let trip = self.trips.get(&code).ok_or(CoreError::UnknownCode(code))?;
        trip.ensure_accepted()?;

        let party = trip
            .party_of(caller)
            .ok_or(CoreError::NotParticipant { code, caller: *caller })?;
        if trip.has_confirmed(party) {
            return Err(CoreError::AlreadyConfirmed { code, party });
        }

        let rating = match party {
            Party::Customer => {
                let max = self.config.trip.max_rating;
                if rating > max {
                    return Err(CoreError::InvalidRating { rating, max });
                }
                rating
            }
            Party::Driver => {
                if rating != 0 {
                    warn!("Ignoring rating {} supplied by driver of trip {}", rating, code);
                }
                0
            }
        };

        let now = self.clock.now();
        let mut updated = trip.clone();
        let settled = updated.confirm(party, rating, now)?;

        if !settled {
            let awaiting = match party {
                Party::Driver => Party::Customer,
                Party::Customer => Party::Driver,
            };
            self.trips.insert(code, updated);
            self.record_event(now, LedgerEventKind::TripConfirmed { code, party });

            debug!("Trip {} confirmed by the {:?}, awaiting the {:?}", code, party, awaiting);
            return Ok(Confirmation::Pending { awaiting });
        }

        updated.complete(now)?;
        let driver = updated.driver;
        let applied_rating = updated.rating_to_record();

        // Everything that can fail is checked before escrow moves.
        match self.escrow.held_for(code) {
            Some(entry) if entry.amount == updated.fare => {}
            other => {
                return Err(CoreError::Escrow(format!(
                    "trip {} escrow mismatch: expected {}, held {:?}",
                    code,
                    updated.fare,
                    other.map(|entry| entry.amount)
                )));
            }
        }
        if let Some(r) = applied_rating {
            let record = self
                .registry
                .driver(&driver)
                .ok_or_else(|| CoreError::StateError(format!("driver {:?} missing from registry", driver)))?;
            if record.rated(r).is_none() {
                return Err(CoreError::StateError(format!("rating totals overflow for driver {:?}", driver)));
            }
        }

        let payout = self.escrow.release(code, driver)?;
        if let Some(r) = applied_rating {
            self.ratings.record_rating(&mut self.registry, &driver, code, r, now)?;
        }
        let trip_hash = updated.calculate_hash();
        self.trips.insert(code, updated);

        self.record_event(now, LedgerEventKind::TripConfirmed { code, party });
        self.record_event(
            now,
            LedgerEventKind::TripCompleted { code, driver, fare: payout, rating: applied_rating, trip_hash },
        );

        info!("Trip {} completed: released {} to {:?} (rating {:?})", code, payout, driver, applied_rating);
        Ok(Confirmation::Settled { driver, payout, rating: applied_rating })
    }

    /// Cancel trip `code` and refund the fare to its customer
    ///
    /// A `Requested` trip can be cancelled by its customer at any time. An
    /// `Accepted` trip can be cancelled by either participant once it has
    /// been inactive for the configured confirmation timeout.
    pub fn cancel_trip(&mut self, caller: &Address, code: TripCode) -> Result<Amount> {
        let trip = self.trips.get(&code).ok_or(CoreError::UnknownCode(code))?;
        let party = trip
            .party_of(caller)
            .ok_or(CoreError::NotParticipant { code, caller: *caller })?;
        let now = self.clock.now();

        match trip.status {
            TripStatus::Requested => {
                if party != Party::Customer {
                    return Err(CoreError::NotCancellable(code));
                }
            }
            TripStatus::Accepted => {
                let idle = now - trip.last_activity;
                if idle < self.confirmation_timeout {
                    return Err(CoreError::TimeoutNotReached {
                        code,
                        remaining_secs: (self.confirmation_timeout - idle).num_seconds(),
                    });
                }
            }
            TripStatus::Completed => return Err(CoreError::AlreadyCompleted(code)),
            TripStatus::Cancelled => return Err(CoreError::NotCancellable(code)),
        }

        let was_requested = trip.status == TripStatus::Requested;
        let mut updated = trip.clone();
        updated.cancel(now)?;

        let entry = self.escrow.refund(code)?;
        if was_requested {
            self.pending.remove(&updated.customer);
        }
        self.trips.insert(code, updated);
        self.record_event(
            now,
            LedgerEventKind::TripCancelled { code, cancelled_by: *caller, refunded: entry.amount },
        );

        info!("Trip {} cancelled by {:?}, refunded {} to {:?}", code, caller, entry.amount, entry.depositor);
        Ok(entry.amount)
    }

    /// Accepted trips whose confirmation timeout has elapsed
    pub fn expired_trips(&self) -> Vec<TripCode> {
        let now = self.clock.now();
        self.trips
            .values()
            .filter(|trip| trip.status == TripStatus::Accepted)
            .filter(|trip| now - trip.last_activity >= self.confirmation_timeout)
            .map(|trip| trip.code)
            .collect()
    }

    /// Check a revealed `(value, salt)` pair against a stored trip commitment
    ///
    /// Open to the trip's participants and the administrator. A contact
    /// commitment that was never set does not match anything.
    pub fn verify_trip_commitment(
        &self,
        caller: &Address,
        code: TripCode,
        field: CommitmentField,
        value: &[u8],
        salt: &Salt,
    ) -> Result<bool> {
        let trip = self.trips.get(&code).ok_or(CoreError::UnknownCode(code))?;
        if *caller != self.registry.auditor() && trip.party_of(caller).is_none() {
            return Err(CoreError::NotParticipant { code, caller: *caller });
        }

        Ok(match trip.commitment(field) {
            Some(commitment) => self.codec.verify(commitment, value, salt),
            None => false,
        })
    }

    // ---- Read views ----

    /// Trip record for `code`
    pub fn trip(&self, code: TripCode) -> Option<&Trip> {
        self.trips.get(&code)
    }

    /// All trip records in code order
    pub fn trips(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values()
    }

    /// Outstanding request of `customer`
    pub fn pending_request(&self, customer: &Address) -> Option<TripCode> {
        self.pending.get(customer).copied()
    }

    /// Value paid out or refunded to `account`
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.escrow.balance_of(account)
    }

    /// Sum of all fares currently in escrow
    pub fn escrowed_total(&self) -> Amount {
        self.escrow.total_held()
    }

    /// Escrow vault
    pub fn escrow(&self) -> &EscrowVault {
        &self.escrow
    }

    /// Events recorded since the journal was last drained
    ///
    /// The journal is kept in memory and copied into every snapshot until
    /// [`drain_events`](Self::drain_events) hands it off.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Take every undrained event, oldest first
    ///
    /// Sequence numbers keep counting across drains.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        debug!("Draining {} journal events", self.events.len());
        std::mem::take(&mut self.events)
    }

    /// Sequence number the next event will receive
    pub fn next_event_sequence(&self) -> u64 {
        self.next_sequence
    }

    // ---- Snapshots ----

    /// Capture the full ledger state
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            auditor: self.registry.auditor(),
            next_code: self.next_code,
            drivers: self.registry.records(),
            trips: self.trips.values().cloned().collect(),
            escrow: self.escrow.clone(),
            ratings: self.ratings.submissions().to_vec(),
            events: self.events.clone(),
            next_event_sequence: self.next_sequence,
        }
    }

    /// Rebuild a ledger from a snapshot
    pub fn restore(config: LedgerConfig, snapshot: LedgerSnapshot) -> Result<Self> {
        Self::restore_with_clock(config, snapshot, Arc::new(SystemClock))
    }

    /// Rebuild a ledger from a snapshot with a custom time source
    pub fn restore_with_clock(
        config: LedgerConfig,
        snapshot: LedgerSnapshot,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::StateError(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.next_code < config.trip.base_confirmation_code {
            return Err(CoreError::StateError(format!(
                "snapshot counter {} is below the configured base {}",
                snapshot.next_code, config.trip.base_confirmation_code
            )));
        }

        let mut ledger = Self::with_clock(config, snapshot.auditor, clock)?;
        ledger.registry = DriverRegistry::from_records(
            snapshot.auditor,
            ledger.config.trip.rating_seed_policy,
            snapshot.drivers,
        )?;

        let mut open_trips = 0;
        for trip in snapshot.trips {
            if trip.code >= snapshot.next_code {
                return Err(CoreError::StateError(format!(
                    "trip {} was issued after counter {}",
                    trip.code, snapshot.next_code
                )));
            }

            let held = snapshot.escrow.held_for(trip.code);
            if trip.is_terminal() {
                if held.is_some() {
                    return Err(CoreError::StateError(format!("settled trip {} still holds escrow", trip.code)));
                }
            } else {
                open_trips += 1;
                match held {
                    Some(entry) if entry.amount == trip.fare && entry.depositor == trip.customer => {}
                    _ => {
                        return Err(CoreError::StateError(format!(
                            "open trip {} does not match its escrow deposit",
                            trip.code
                        )));
                    }
                }
            }

            if trip.status == TripStatus::Requested
                && ledger.pending.insert(trip.customer, trip.code).is_some()
            {
                return Err(CoreError::StateError(format!(
                    "customer {:?} has more than one outstanding request",
                    trip.customer
                )));
            }
            if ledger.trips.insert(trip.code, trip).is_some() {
                return Err(CoreError::StateError("duplicate trip code in snapshot".to_string()));
            }
        }
        if snapshot.escrow.held_codes().count() != open_trips {
            return Err(CoreError::StateError("escrow holds deposits for unknown trips".to_string()));
        }

        ledger.next_code = snapshot.next_code;
        ledger.escrow = snapshot.escrow;
        ledger.ratings = RatingLedger::from_submissions(snapshot.ratings);
        let mut expected = snapshot.next_event_sequence.checked_sub(snapshot.events.len() as u64);
        for event in &snapshot.events {
            if expected != Some(event.sequence) {
                return Err(CoreError::StateError(format!(
                    "journal event {} is out of sequence",
                    event.sequence
                )));
            }
            expected = expected.map(|sequence| sequence + 1);
        }
        ledger.events = snapshot.events;
        ledger.next_sequence = snapshot.next_event_sequence;

        info!(
            "Restored ride ledger: {} drivers, {} trips, next code {}",
            ledger.registry.driver_count(),
            ledger.trips.len(),
            ledger.next_code
        );
        Ok(ledger)
    }

    /// Write a snapshot to `path`
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.snapshot().save(path)
    }

    /// Load a ledger from a snapshot file
    pub fn load_snapshot<P: AsRef<Path>>(path: P, config: LedgerConfig) -> Result<Self> {
        Self::restore(config, LedgerSnapshot::load(path)?)
    }
}

/// Thread-safe ride ledger
pub type SharedLedger = Arc<RwLock<RideLedger>>;

/// Create a new shared ride ledger
pub fn create_shared_ledger(config: LedgerConfig, auditor: Address) -> Result<SharedLedger> {
    let ledger = RideLedger::new(config, auditor)?;
    Ok(Arc::new(RwLock::new(ledger)))
}
