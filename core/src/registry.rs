//! Driver registry
//!
//! Onboarding and rating storage for drivers. Writes and rating reads are
//! restricted to the administrator account fixed at construction.

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use ethers::types::Address;
use log::{info, warn};

use crate::config::RatingSeedPolicy;
use crate::error::{CoreError, Result};
use crate::models::Driver;

/// Registered drivers keyed by account
#[derive(Debug, Clone)]
pub struct DriverRegistry {
    /// Administrator account
    auditor: Address,

    /// Seed handling for new drivers
    seed_policy: RatingSeedPolicy,

    /// Driver records
    drivers: HashMap<Address, Driver>,
}

impl DriverRegistry {
    /// Create an empty registry administered by `auditor`
    pub fn new(auditor: Address, seed_policy: RatingSeedPolicy) -> Self {
        DriverRegistry {
            auditor,
            seed_policy,
            drivers: HashMap::new(),
        }
    }

    /// Rebuild a registry from stored records
    pub(crate) fn from_records(
        auditor: Address,
        seed_policy: RatingSeedPolicy,
        records: Vec<Driver>,
    ) -> Result<Self> {
        let mut registry = DriverRegistry::new(auditor, seed_policy);
        for driver in records {
            if driver.rating_count == 0 && driver.rating_sum != 0 {
                return Err(CoreError::StateError(format!(
                    "driver {:?} has a rating sum without ratings",
                    driver.id
                )));
            }
            if registry.drivers.insert(driver.id, driver).is_some() {
                return Err(CoreError::StateError("duplicate driver record".to_string()));
            }
        }
        Ok(registry)
    }

    /// Administrator account
    pub fn auditor(&self) -> Address {
        self.auditor
    }

    /// Fail with `Unauthorized` unless `caller` is the administrator
    pub fn ensure_auditor(&self, caller: &Address) -> Result<()> {
        if *caller != self.auditor {
            warn!("Rejected privileged call from {:?}", caller);
            return Err(CoreError::Unauthorized(*caller));
        }
        Ok(())
    }

    /// Register a driver
    pub fn register_driver(
        &mut self,
        caller: &Address,
        driver: Address,
        rating_seed: u64,
        now: DateTime<Utc>,
    ) -> Result<&Driver> {
        self.ensure_auditor(caller)?;

        if self.drivers.contains_key(&driver) {
            return Err(CoreError::AlreadyRegistered(driver));
        }

        info!("Registering driver {:?} (seed {}, {:?})", driver, rating_seed, self.seed_policy);
        let record = Driver::new(driver, rating_seed, self.seed_policy, now);
        Ok(&*self.drivers.entry(driver).or_insert(record))
    }

    /// Number of registered drivers
    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    /// Whether `driver` is registered
    pub fn is_registered(&self, driver: &Address) -> bool {
        self.drivers.contains_key(driver)
    }

    /// Average rating of a driver; 0 before the first rating
    pub fn get_driver_rating(&self, caller: &Address, driver: &Address) -> Result<u64> {
        let record = self.driver_summary(caller, driver)?;
        Ok(record.average_rating().unwrap_or(0))
    }

    /// Full driver record
    pub fn driver_summary(&self, caller: &Address, driver: &Address) -> Result<&Driver> {
        self.ensure_auditor(caller)?;
        self.drivers.get(driver).ok_or(CoreError::NotFound(*driver))
    }

    pub(crate) fn driver(&self, driver: &Address) -> Option<&Driver> {
        self.drivers.get(driver)
    }

    pub(crate) fn driver_mut(&mut self, driver: &Address) -> Option<&mut Driver> {
        self.drivers.get_mut(driver)
    }

    /// Records sorted by account, for snapshots
    pub(crate) fn records(&self) -> Vec<Driver> {
        let mut records: Vec<Driver> = self.drivers.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn auditor() -> Address {
        Address::from([0xad; 20])
    }

    #[test]
    fn test_register_and_count() {
        let mut registry = DriverRegistry::new(auditor(), RatingSeedPolicy::Advisory);

        registry.register_driver(&auditor(), Address::from([1; 20]), 69, Utc::now()).unwrap();
        assert_eq!(registry.driver_count(), 1);
        assert!(registry.is_registered(&Address::from([1; 20])));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = DriverRegistry::new(auditor(), RatingSeedPolicy::Advisory);
        registry.register_driver(&auditor(), Address::from([1; 20]), 0, Utc::now()).unwrap();

        let result = registry.register_driver(&auditor(), Address::from([1; 20]), 5, Utc::now());
        assert!(matches!(result, Err(CoreError::AlreadyRegistered(_))));
        assert_eq!(registry.driver_count(), 1);
    }

    #[test]
    fn test_non_auditor_rejected() {
        let mut registry = DriverRegistry::new(auditor(), RatingSeedPolicy::Advisory);
        let intruder = Address::from([9; 20]);

        let result = registry.register_driver(&intruder, Address::from([1; 20]), 0, Utc::now());
        assert!(matches!(result, Err(CoreError::Unauthorized(a)) if a == intruder));
        assert_eq!(registry.driver_count(), 0);

        registry.register_driver(&auditor(), Address::from([1; 20]), 0, Utc::now()).unwrap();
        assert!(matches!(
            registry.get_driver_rating(&intruder, &Address::from([1; 20])),
            Err(CoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_rating_lookup() {
        let mut registry = DriverRegistry::new(auditor(), RatingSeedPolicy::InitialRating);
        registry.register_driver(&auditor(), Address::from([1; 20]), 4, Utc::now()).unwrap();

        assert_eq!(registry.get_driver_rating(&auditor(), &Address::from([1; 20])).unwrap(), 4);
        assert!(matches!(
            registry.get_driver_rating(&auditor(), &Address::from([2; 20])),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_from_records_rejects_inconsistent_driver() {
        let mut bad = Driver::new(Address::from([1; 20]), 0, RatingSeedPolicy::Advisory, Utc::now());
        bad.rating_sum = 3;

        let result = DriverRegistry::from_records(auditor(), RatingSeedPolicy::Advisory, vec![bad]);
        assert!(matches!(result, Err(CoreError::StateError(_))));
    }

    proptest! {
        #[test]
        fn prop_count_matches_distinct_ids(ids in proptest::collection::vec(0u8..16, 0..40)) {
            let mut registry = DriverRegistry::new(auditor(), RatingSeedPolicy::Advisory);
            let mut distinct = std::collections::HashSet::new();

            for id in ids {
                let driver = Address::from([id; 20]);
                let result = registry.register_driver(&auditor(), driver, 0, Utc::now());
                if distinct.insert(id) {
                    prop_assert!(result.is_ok());
                } else {
                    let rejected = matches!(result, Err(CoreError::AlreadyRegistered(_)));
                    prop_assert!(rejected);
                }
            }

            prop_assert_eq!(registry.driver_count(), distinct.len());
        }
    }
}
