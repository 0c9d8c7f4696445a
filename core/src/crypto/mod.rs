//! Cryptographic primitives for the ride ledger
//!
//! This module provides domain-separated hashing and the commitment codec
//! used to keep locations and contact details out of ledger state.

mod commitment;
mod hasher;

pub use commitment::{Commitment, CommitmentCodec, Salt};
pub use hasher::{Blake2sHasher, KeccakHasher, SecureHasher, Sha256Hasher};

use sha2::{Sha256, Digest};
use constant_time_eq::constant_time_eq;

use crate::config::HashAlgorithm;

/// Create a hasher instance for the given algorithm
pub fn hasher_for(algorithm: HashAlgorithm) -> Box<dyn SecureHasher> {
    match algorithm {
        HashAlgorithm::Sha256 => Sha256Hasher::new_instance(),
        HashAlgorithm::Blake2s => Blake2sHasher::new_instance(),
        HashAlgorithm::Keccak256 => KeccakHasher::new_instance(),
    }
}

/// Create a domain-separated secure hash of multiple inputs using SHA-256
///
/// # Arguments
///
/// * `domain` - Domain prefix (e.g., "DCABS_TRIP")
/// * `data` - Vector of data to hash
///
/// # Returns
///
/// A 32-byte secure hash with domain separation
pub fn secure_hash_multiple(domain: &str, data: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();

    hasher.update(domain.as_bytes());
    hasher.update([domain.len() as u8]);

    // Element count and length prefixes keep concatenations apart
    hasher.update([data.len() as u8]);
    for element in data {
        hasher.update((element.len() as u32).to_be_bytes());
        hasher.update(element);
    }

    hasher.finalize().into()
}

/// Verify a hash in constant time
pub fn verify_hash(expected: &[u8; 32], actual: &[u8; 32]) -> bool {
    constant_time_eq(expected, actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_hash_multiple() {
        let data1 = b"data1";
        let data2 = b"data2";

        let hash = secure_hash_multiple("TEST", &[data1, data2]);
        assert_eq!(hash, secure_hash_multiple("TEST", &[data1, data2]));
        assert_ne!(hash, secure_hash_multiple("DIFFERENT", &[data1, data2]));
        assert_ne!(hash, secure_hash_multiple("TEST", &[data2, data1]));

        // Concatenation should not collide
        assert_ne!(hash, secure_hash_multiple("TEST", &[b"data1data2"]));
    }

    #[test]
    fn test_verify_hash() {
        let hash = secure_hash_multiple("TEST", &[b"test data"]);
        let different = secure_hash_multiple("TEST", &[b"different data"]);

        assert!(verify_hash(&hash, &hash));
        assert!(!verify_hash(&hash, &different));
    }

    #[test]
    fn test_hasher_for_each_algorithm_differs() {
        let sha = hasher_for(HashAlgorithm::Sha256).hash_multiple_with_domain("TEST", &[b"x"]);
        let blake = hasher_for(HashAlgorithm::Blake2s).hash_multiple_with_domain("TEST", &[b"x"]);
        let keccak = hasher_for(HashAlgorithm::Keccak256).hash_multiple_with_domain("TEST", &[b"x"]);

        assert_ne!(sha, blake);
        assert_ne!(sha, keccak);
        assert_ne!(blake, keccak);
    }
}
