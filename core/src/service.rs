//! Async front end for the ride ledger
//!
//! [`LedgerService`] owns a [`RideLedger`] and applies commands received
//! over a bounded channel strictly one at a time, in arrival order. Callers
//! talk to it through cloneable [`LedgerHandle`]s.

use ethers::types::Address;
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::crypto::{Commitment, Salt};
use crate::error::{to_service_error, CoreError, Result};
use crate::models::{Amount, CommitmentField, Trip, TripCode};
use crate::snapshot::LedgerSnapshot;
use crate::state::{Confirmation, RideLedger};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Request handled by the service loop
#[allow(missing_docs)]
#[derive(Debug)]
pub enum LedgerCommand {
    /// Register a driver
    RegisterDriver {
        caller: Address,
        driver: Address,
        rating_seed: u64,
        reply: Reply<()>,
    },

    /// Read a driver's average rating
    GetDriverRating {
        caller: Address,
        driver: Address,
        reply: Reply<u64>,
    },

    /// Request a ride
    SetPickup {
        caller: Address,
        location_commitment: Commitment,
        destination_commitment: Commitment,
        driver: Address,
        fare: Amount,
        reply: Reply<TripCode>,
    },

    /// Accept a customer's request
    AcceptTrip {
        caller: Address,
        contact_commitment: Commitment,
        customer: Address,
        reply: Reply<TripCode>,
    },

    /// Confirm the end of a trip
    EndTrip {
        caller: Address,
        code: TripCode,
        rating: u8,
        reply: Reply<Confirmation>,
    },

    /// Cancel a trip
    CancelTrip {
        caller: Address,
        code: TripCode,
        reply: Reply<Amount>,
    },

    /// Check a commitment reveal
    VerifyCommitment {
        caller: Address,
        code: TripCode,
        field: CommitmentField,
        value: Vec<u8>,
        salt: Salt,
        reply: Reply<bool>,
    },

    /// Read a trip record
    GetTrip {
        code: TripCode,
        reply: oneshot::Sender<Option<Trip>>,
    },

    /// Read an account balance
    BalanceOf {
        account: Address,
        reply: oneshot::Sender<Amount>,
    },

    /// Capture the ledger state
    Snapshot {
        reply: oneshot::Sender<LedgerSnapshot>,
    },
}

/// Single-writer task owning a ledger
pub struct LedgerService {
    ledger: RideLedger,
    receiver: mpsc::Receiver<LedgerCommand>,
}

impl LedgerService {
    /// Wrap `ledger`, returning the service and a handle to it
    ///
    /// `queue_depth` bounds the number of commands waiting to be applied.
    pub fn new(ledger: RideLedger, queue_depth: usize) -> (Self, LedgerHandle) {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        (LedgerService { ledger, receiver }, LedgerHandle { sender })
    }

    /// Spawn a service for `ledger` on the current runtime
    ///
    /// Uses the ledger's configured queue depth and installs the configured
    /// logger if none is set yet. The task ends once every handle is dropped
    /// and yields the final ledger.
    pub fn spawn(ledger: RideLedger) -> (LedgerHandle, JoinHandle<RideLedger>) {
        if ledger.config().init_logging() {
            debug!("Logging initialized at {}", ledger.config().effective_log_level());
        }
        let depth = ledger.config().service_queue_depth;
        let (service, handle) = Self::new(ledger, depth);
        (handle, tokio::spawn(service.run()))
    }

    /// Apply commands until every handle is dropped
    pub async fn run(mut self) -> RideLedger {
        info!("Ledger service started");

        while let Some(command) = self.receiver.recv().await {
            self.apply(command);
        }

        info!("Ledger service stopped");
        self.ledger
    }

    fn apply(&mut self, command: LedgerCommand) {
        let ledger = &mut self.ledger;

        // A dropped reply receiver only means the caller stopped waiting.
        let delivered = match command {
            LedgerCommand::RegisterDriver { caller, driver, rating_seed, reply } => {
                reply.send(ledger.register_driver(&caller, driver, rating_seed)).is_ok()
            }
            LedgerCommand::GetDriverRating { caller, driver, reply } => {
                reply.send(ledger.get_driver_rating(&caller, &driver)).is_ok()
            }
            LedgerCommand::SetPickup {
                caller,
                location_commitment,
                destination_commitment,
                driver,
                fare,
                reply,
            } => reply
                .send(ledger.set_pickup(&caller, location_commitment, destination_commitment, driver, fare))
                .is_ok(),
            LedgerCommand::AcceptTrip { caller, contact_commitment, customer, reply } => {
                reply.send(ledger.accept_trip(&caller, contact_commitment, &customer)).is_ok()
            }
            LedgerCommand::EndTrip { caller, code, rating, reply } => {
                reply.send(ledger.end_trip(&caller, code, rating)).is_ok()
            }
            LedgerCommand::CancelTrip { caller, code, reply } => {
                reply.send(ledger.cancel_trip(&caller, code)).is_ok()
            }
            LedgerCommand::VerifyCommitment { caller, code, field, value, salt, reply } => reply
                .send(ledger.verify_trip_commitment(&caller, code, field, &value, &salt))
                .is_ok(),
            LedgerCommand::GetTrip { code, reply } => reply.send(ledger.trip(code).cloned()).is_ok(),
            LedgerCommand::BalanceOf { account, reply } => reply.send(ledger.balance_of(&account)).is_ok(),
            LedgerCommand::Snapshot { reply } => reply.send(ledger.snapshot()).is_ok(),
        };

        if !delivered {
            debug!("Caller dropped before receiving a ledger reply");
        }
    }
}

/// Cloneable client for a running [`LedgerService`]
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> LedgerCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| CoreError::ServiceError("ledger service is not running".to_string()))?;
        response.await.map_err(to_service_error)
    }

    /// Register a driver
    pub async fn register_driver(&self, caller: Address, driver: Address, rating_seed: u64) -> Result<()> {
        self.request(|reply| LedgerCommand::RegisterDriver { caller, driver, rating_seed, reply })
            .await?
    }

    /// Average rating of a driver
    pub async fn get_driver_rating(&self, caller: Address, driver: Address) -> Result<u64> {
        self.request(|reply| LedgerCommand::GetDriverRating { caller, driver, reply })
            .await?
    }

    /// Request a ride
    pub async fn set_pickup(
        &self,
        caller: Address,
        location_commitment: Commitment,
        destination_commitment: Commitment,
        driver: Address,
        fare: Amount,
    ) -> Result<TripCode> {
        self.request(|reply| LedgerCommand::SetPickup {
            caller,
            location_commitment,
            destination_commitment,
            driver,
            fare,
            reply,
        })
        .await?
    }

    /// Accept a customer's request
    pub async fn accept_trip(
        &self,
        caller: Address,
        contact_commitment: Commitment,
        customer: Address,
    ) -> Result<TripCode> {
        self.request(|reply| LedgerCommand::AcceptTrip { caller, contact_commitment, customer, reply })
            .await?
    }

    /// Confirm the end of a trip
    pub async fn end_trip(&self, caller: Address, code: TripCode, rating: u8) -> Result<Confirmation> {
        self.request(|reply| LedgerCommand::EndTrip { caller, code, rating, reply })
            .await?
    }

    /// Cancel a trip
    pub async fn cancel_trip(&self, caller: Address, code: TripCode) -> Result<Amount> {
        self.request(|reply| LedgerCommand::CancelTrip { caller, code, reply })
            .await?
    }

    /// Check a commitment reveal
    pub async fn verify_trip_commitment(
        &self,
        caller: Address,
        code: TripCode,
        field: CommitmentField,
        value: Vec<u8>,
        salt: Salt,
    ) -> Result<bool> {
        self.request(|reply| LedgerCommand::VerifyCommitment { caller, code, field, value, salt, reply })
            .await?
    }

    /// Trip record for `code`
    pub async fn trip(&self, code: TripCode) -> Result<Option<Trip>> {
        self.request(|reply| LedgerCommand::GetTrip { code, reply }).await
    }

    /// Balance credited to `account`
    pub async fn balance_of(&self, account: Address) -> Result<Amount> {
        self.request(|reply| LedgerCommand::BalanceOf { account, reply }).await
    }

    /// Capture the ledger state
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.request(|reply| LedgerCommand::Snapshot { reply }).await
    }
}
