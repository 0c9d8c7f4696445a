//! Driver registry record

use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Serialize, Deserialize};

use crate::config::RatingSeedPolicy;
use crate::error::{CoreError, Result};

/// A registered driver and its accumulated ratings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Driver account
    pub id: Address,

    /// Sum of all ratings received
    pub rating_sum: u64,

    /// Number of ratings received
    pub rating_count: u64,

    /// Seed passed at registration
    pub rating_seed: u64,

    /// Registration time
    pub registered_at: DateTime<Utc>,
}

impl Driver {
    /// Create a driver record, applying the seed according to `policy`
    pub fn new(id: Address, rating_seed: u64, policy: RatingSeedPolicy, registered_at: DateTime<Utc>) -> Self {
        let (rating_sum, rating_count) = match policy {
            RatingSeedPolicy::Advisory => (0, 0),
            RatingSeedPolicy::InitialRating => (rating_seed, 1),
        };

        Driver {
            id,
            rating_sum,
            rating_count,
            rating_seed,
            registered_at,
        }
    }

    /// Integer average rating, `None` before the first rating
    pub fn average_rating(&self) -> Option<u64> {
        if self.rating_count == 0 {
            None
        } else {
            Some(self.rating_sum / self.rating_count)
        }
    }

    /// Sum and count after one more rating, or `None` on overflow
    pub fn rated(&self, rating: u8) -> Option<(u64, u64)> {
        let sum = self.rating_sum.checked_add(rating as u64)?;
        let count = self.rating_count.checked_add(1)?;
        Some((sum, count))
    }

    /// Add one rating
    pub(crate) fn apply_rating(&mut self, rating: u8) -> Result<()> {
        let (sum, count) = self
            .rated(rating)
            .ok_or_else(|| CoreError::StateError(format!("rating totals overflow for driver {:?}", self.id)))?;
        self.rating_sum = sum;
        self.rating_count = count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_seed_starts_empty() {
        let driver = Driver::new(Address::from([1; 20]), 69, RatingSeedPolicy::Advisory, Utc::now());

        assert_eq!(driver.rating_sum, 0);
        assert_eq!(driver.rating_count, 0);
        assert_eq!(driver.rating_seed, 69);
        assert_eq!(driver.average_rating(), None);
    }

    #[test]
    fn test_initial_rating_seed_counts_once() {
        let mut driver = Driver::new(Address::from([1; 20]), 4, RatingSeedPolicy::InitialRating, Utc::now());
        assert_eq!(driver.average_rating(), Some(4));

        driver.apply_rating(2).unwrap();
        assert_eq!(driver.rating_sum, 6);
        assert_eq!(driver.rating_count, 2);
        assert_eq!(driver.average_rating(), Some(3));
    }

    #[test]
    fn test_rating_overflow_is_rejected() {
        let mut driver = Driver::new(Address::from([1; 20]), 0, RatingSeedPolicy::Advisory, Utc::now());
        driver.rating_sum = u64::MAX - 2;
        driver.rating_count = 7;

        assert_eq!(driver.rated(2), Some((u64::MAX, 8)));
        assert_eq!(driver.rated(3), None);
        assert!(matches!(driver.apply_rating(3), Err(CoreError::StateError(_))));
        assert_eq!((driver.rating_sum, driver.rating_count), (u64::MAX - 2, 7));
    }
}
