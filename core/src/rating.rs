//! Rating ledger
//!
//! Ratings only enter the ledger through trip settlement. Each accepted
//! rating updates the driver's running sum/count in the registry and is
//! journaled here for administrator audit.

use chrono::{DateTime, Utc};
use ethers::types::Address;
use log::debug;
use serde::{Serialize, Deserialize};

use crate::error::{CoreError, Result};
use crate::models::TripCode;
use crate::registry::DriverRegistry;

/// One rating applied to a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSubmission {
    /// Trip the rating came from
    pub trip_code: TripCode,

    /// Rated driver
    pub driver: Address,

    /// Rating value, never 0
    pub rating: u8,

    /// Settlement time
    pub recorded_at: DateTime<Utc>,
}

/// History of applied ratings
#[derive(Debug, Clone, Default)]
pub struct RatingLedger {
    submissions: Vec<RatingSubmission>,
}

impl RatingLedger {
    /// Create an empty rating ledger
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_submissions(submissions: Vec<RatingSubmission>) -> Self {
        RatingLedger { submissions }
    }

    /// Apply a settled trip's rating to its driver
    ///
    /// A rating of 0 means none was given and leaves the driver untouched.
    /// Returns whether the rating was applied.
    pub(crate) fn record_rating(
        &mut self,
        registry: &mut DriverRegistry,
        driver: &Address,
        trip_code: TripCode,
        rating: u8,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if rating == 0 {
            return Ok(false);
        }

        let record = registry
            .driver_mut(driver)
            .ok_or(CoreError::NotFound(*driver))?;
        record.apply_rating(rating)?;
        debug!(
            "Rated driver {:?} with {} (sum {}, count {})",
            driver, rating, record.rating_sum, record.rating_count
        );

        self.submissions.push(RatingSubmission {
            trip_code,
            driver: *driver,
            rating,
            recorded_at: now,
        });
        Ok(true)
    }

    /// Ratings received by `driver`, oldest first
    pub fn submissions_for<'a>(&'a self, driver: &'a Address) -> impl Iterator<Item = &'a RatingSubmission> + 'a {
        self.submissions.iter().filter(move |s| s.driver == *driver)
    }

    /// All submissions, oldest first
    pub fn submissions(&self) -> &[RatingSubmission] {
        &self.submissions
    }
}
