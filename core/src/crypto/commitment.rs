//! Salted one-way commitments
//!
//! A commitment binds a raw value (pickup location, destination, phone
//! number) to a secret salt. Only the commitment is stored in the ledger;
//! whoever holds the `(value, salt)` pair can later recompute and compare it.

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use rand::RngCore;
use serde::{Serialize, Deserialize};

use crate::config::{CommitmentConfig, HashAlgorithm};
use crate::error::{CoreError, Result};
use crate::models::domains;
use super::{hasher_for, verify_hash};

fn parse_hex_32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        CoreError::InvalidRequest(format!("expected 32 bytes, got {}", bytes.len()))
    })
}

/// One-way hash of a `(value, salt)` pair
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// Wrap raw hash bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Commitment(bytes)
    }

    /// Raw hash bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Debug for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Commitment({})", hex::encode(&self.0[0..4]))
    }
}

impl Display for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Commitment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex_32(s).map(Commitment)
    }
}

/// Secret salt blinding a committed value
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; 32]);

impl Salt {
    /// Draw a fresh salt from the thread-local CSPRNG
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Salt(bytes)
    }

    /// Wrap raw salt bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Salt(bytes)
    }

    /// Raw salt bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex encoding, for handing the salt to the other party off-ledger
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// Salts are secrets; keep them out of logs.
impl Debug for Salt {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Salt(..)")
    }
}

impl FromStr for Salt {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex_32(s).map(Salt)
    }
}

/// Derives and verifies commitments with a fixed hash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentCodec {
    algorithm: HashAlgorithm,
}

impl Default for CommitmentCodec {
    fn default() -> Self {
        CommitmentCodec::new(HashAlgorithm::default())
    }
}

impl CommitmentCodec {
    /// Create a codec for the given algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        CommitmentCodec { algorithm }
    }

    /// Create a codec from configuration
    pub fn from_config(config: &CommitmentConfig) -> Self {
        CommitmentCodec::new(config.hash_algorithm)
    }

    /// Algorithm in use
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Commit to `value` under `salt`
    ///
    /// Deterministic: the same pair always yields the same commitment. The
    /// value is not validated in any way.
    pub fn commit(&self, value: &[u8], salt: &Salt) -> Commitment {
        let mut hasher = hasher_for(self.algorithm);
        Commitment(hasher.hash_multiple_with_domain(domains::COMMITMENT, &[value, salt.as_bytes()]))
    }

    /// Recompute the commitment for a revealed pair and compare in constant time
    pub fn verify(&self, commitment: &Commitment, value: &[u8], salt: &Salt) -> bool {
        let recomputed = self.commit(value, salt);
        verify_hash(commitment.as_bytes(), recomputed.as_bytes())
    }
}
