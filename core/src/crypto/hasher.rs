//! Secure hasher implementations with domain separation
//!
//! The commitment codec picks one of these at construction time based on
//! the configured [`HashAlgorithm`](crate::config::HashAlgorithm).

use sha2::{Sha256, Digest};
use blake2::Blake2s256;
use sha3::Keccak256;
use std::fmt::Debug;

/// SecureHasher trait for domain-separated hashing
pub trait SecureHasher: Debug + Send + Sync + 'static {
    /// Create a new boxed instance of the hasher
    fn new_instance() -> Box<dyn SecureHasher>
    where
        Self: Sized;

    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and return the result
    fn finalize(&mut self) -> [u8; 32];

    /// Hash multiple data elements with domain separation
    fn hash_multiple_with_domain(&mut self, domain: &str, data: &[&[u8]]) -> [u8; 32] {
        self.update(domain.as_bytes());
        self.update(&[domain.len() as u8]);
        self.update(&[data.len() as u8]);

        for element in data {
            // 4-byte big-endian length prefix per element
            self.update(&(element.len() as u32).to_be_bytes());
            self.update(element);
        }

        self.finalize()
    }
}

macro_rules! digest_hasher {
    ($(#[$meta:meta])* $name:ident, $inner:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            inner: $inner,
        }

        impl $name {
            /// Create a fresh hasher
            pub fn new() -> Self {
                $name { inner: <$inner>::new() }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl SecureHasher for $name {
            fn new_instance() -> Box<dyn SecureHasher> {
                Box::new(Self::new())
            }

            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(&mut self) -> [u8; 32] {
                let result = self.inner.clone().finalize();
                let mut output = [0u8; 32];
                output.copy_from_slice(&result);
                output
            }
        }
    };
}

digest_hasher!(
    /// SHA-256 implementation of SecureHasher
    Sha256Hasher,
    Sha256
);

digest_hasher!(
    /// Blake2s implementation of SecureHasher
    Blake2sHasher,
    Blake2s256
);

digest_hasher!(
    /// Keccak-256 implementation of SecureHasher
    KeccakHasher,
    Keccak256
);
