//! Configuration for the core crate
//!
//! This module provides configuration options for the ride ledger,
//! including commitment hashing, trip lifecycle limits and logging.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::error::{CoreError, Result};

/// Upper bound of the customer rating scale
pub const MAX_RATING: u8 = 5;

/// Hash algorithm to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256
    Sha256,

    /// Blake2s
    Blake2s,

    /// Keccak-256
    Keccak256,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Keccak256
    }
}

/// How a driver's rating seed is treated at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingSeedPolicy {
    /// Seed is stored as metadata; the driver starts with no ratings
    Advisory,

    /// Seed counts as the driver's first rating
    InitialRating,
}

impl Default for RatingSeedPolicy {
    fn default() -> Self {
        RatingSeedPolicy::Advisory
    }
}

/// Commitment codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentConfig {
    /// Hash algorithm used for location, destination and contact commitments
    pub hash_algorithm: HashAlgorithm,
}

impl Default for CommitmentConfig {
    fn default() -> Self {
        CommitmentConfig {
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

/// Trip lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripConfig {
    /// First confirmation code handed out
    pub base_confirmation_code: u64,

    /// Highest rating a customer may submit, at most [`MAX_RATING`]
    pub max_rating: u8,

    /// Treatment of the rating seed passed at driver registration
    pub rating_seed_policy: RatingSeedPolicy,

    /// Inactivity period after which an accepted trip may be cancelled
    pub confirmation_timeout: Duration,
}

impl Default for TripConfig {
    fn default() -> Self {
        TripConfig {
            base_confirmation_code: 1000,
            max_rating: MAX_RATING,
            rating_seed_policy: RatingSeedPolicy::default(),
            confirmation_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Commitment configuration
    pub commitment: CommitmentConfig,

    /// Trip configuration
    pub trip: TripConfig,

    /// Depth of the ledger service command queue
    pub service_queue_depth: usize,

    /// Log filter handed to `env_logger` (e.g. `"info"`, `"dcabs_core=debug"`)
    pub log_level: String,

    /// Log at debug level regardless of `log_level`
    pub debug_mode: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            commitment: CommitmentConfig::default(),
            trip: TripConfig::default(),
            service_queue_depth: 128,
            log_level: "info".to_string(),
            debug_mode: false,
        }
    }
}

impl LedgerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: LedgerConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.trip.max_rating == 0 || self.trip.max_rating > MAX_RATING {
            return Err(CoreError::ConfigError(format!(
                "max_rating must be within 1..={}, got {}",
                MAX_RATING, self.trip.max_rating
            )));
        }
        if self.service_queue_depth == 0 {
            return Err(CoreError::ConfigError("service_queue_depth must be at least 1".to_string()));
        }
        chrono::Duration::from_std(self.trip.confirmation_timeout)
            .map_err(crate::error::to_config_error)?;
        Ok(())
    }

    /// Confirmation timeout as a chrono duration
    pub fn confirmation_timeout(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.trip.confirmation_timeout)
            .map_err(crate::error::to_config_error)
    }

    /// Log filter in effect, taking `debug_mode` into account
    pub fn effective_log_level(&self) -> &str {
        if self.debug_mode {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Install the process logger at the configured level
    ///
    /// Returns `false` if a logger was already installed.
    pub fn init_logging(&self) -> bool {
        crate::utils::init_logging(self.effective_log_level())
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config.trip.confirmation_timeout = Duration::from_secs(15 * 60);
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.debug_mode = false;
        config.log_level = "info".to_string();
        config.service_queue_depth = 1024;
        config
    }

    /// Create a testing configuration
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config.trip.confirmation_timeout = Duration::from_secs(60);
        config.service_queue_depth = 8;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();

        assert_eq!(config.commitment.hash_algorithm, HashAlgorithm::Keccak256);
        assert_eq!(config.trip.base_confirmation_code, 1000);
        assert_eq!(config.trip.max_rating, 5);
        assert_eq!(config.trip.rating_seed_policy, RatingSeedPolicy::Advisory);
        assert_eq!(config.trip.confirmation_timeout, Duration::from_secs(86_400));
        assert_eq!(config.log_level, "info");
        assert!(!config.debug_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = LedgerConfig::development();
        assert!(dev.debug_mode);
        assert_eq!(dev.log_level, "debug");

        let prod = LedgerConfig::production();
        assert!(!prod.debug_mode);
        assert_eq!(prod.service_queue_depth, 1024);

        let test = LedgerConfig::testing();
        assert_eq!(test.trip.confirmation_timeout, Duration::from_secs(60));
        assert_eq!(test.service_queue_depth, 8);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(5, true)]
    #[case(6, false)]
    #[case(200, false)]
    fn test_validate_rating_scale(#[case] max_rating: u8, #[case] valid: bool) {
        let mut config = LedgerConfig::default();
        config.trip.max_rating = max_rating;

        match config.validate() {
            Ok(()) => assert!(valid),
            Err(CoreError::ConfigError(_)) => assert!(!valid),
            Err(other) => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_effective_log_level() {
        let mut config = LedgerConfig::production();
        config.log_level = "dcabs_core=warn".to_string();
        assert_eq!(config.effective_log_level(), "dcabs_core=warn");

        config.debug_mode = true;
        assert_eq!(config.effective_log_level(), "debug");
        assert_eq!(LedgerConfig::testing().effective_log_level(), "debug");
    }

    #[test]
    fn test_config_file_io() {
        let mut config = LedgerConfig::default();
        config.commitment.hash_algorithm = HashAlgorithm::Blake2s;
        config.trip.rating_seed_policy = RatingSeedPolicy::InitialRating;

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        config.to_file(path).unwrap();
        let loaded = LedgerConfig::from_file(path).unwrap();

        assert_eq!(loaded.commitment.hash_algorithm, HashAlgorithm::Blake2s);
        assert_eq!(loaded.trip.rating_seed_policy, RatingSeedPolicy::InitialRating);
        assert_eq!(loaded.trip.base_confirmation_code, config.trip.base_confirmation_code);
    }
}
