//! Salted identifier generator.
//!
//! Ids are derived by hashing a per-instance salt together with fresh random
//! bytes and base58-encoding the digest down to a configured minimum length.
//! Uniqueness is probabilistic (birthday-bound on salt plus nonce), not
//! deduplicated: the generator keeps no record of what it has issued.
//!
//! The random source is injected per instance rather than taken from any
//! process-wide state, which keeps concurrent generators independent and
//! makes generation deterministic under a seeded source in tests.

use std::sync::Mutex;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use crate::utils::error::GenerationError;

const DEFAULT_SALT_SIZE: usize = 16;
const DEFAULT_MIN_LEN: usize = 14;

pub struct Generator {
    salt: Vec<u8>,
    min_len: usize,
    rng: Mutex<StdRng>,
}

impl Generator {
    /// A generator with a random salt and the default minimum length.
    /// Fails only if the operating system's entropy source does.
    pub fn new() -> Result<Self, GenerationError> {
        let mut salt = vec![0u8; DEFAULT_SALT_SIZE];
        OsRng.try_fill_bytes(&mut salt)?;
        Self::with_salt(salt)
    }

    /// A generator with a caller-supplied salt.
    pub fn with_salt(salt: Vec<u8>) -> Result<Self, GenerationError> {
        let rng = StdRng::from_rng(OsRng)?;
        Ok(Self {
            salt,
            min_len: DEFAULT_MIN_LEN,
            rng: Mutex::new(rng),
        })
    }

    /// A fully deterministic generator, for tests.
    pub fn with_seed(salt: Vec<u8>, seed: u64) -> Self {
        Self {
            salt,
            min_len: DEFAULT_MIN_LEN,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Override the minimum id length.
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Produce a new opaque identifier of exactly the configured minimum
    /// length. Safe to call concurrently; the only failure mode is the
    /// random source refusing to yield bytes.
    pub fn new_id(&self) -> Result<String, GenerationError> {
        let mut nonce = [0u8; 8];
        self.rng.lock().unwrap().try_fill_bytes(&mut nonce)?;

        let mut hasher = Sha256::new();
        hasher.update(&self.salt);
        hasher.update(nonce);
        let mut digest = hasher.finalize();

        let mut id = bs58::encode(&digest).into_string();
        // one digest encodes to ~44 characters; chain hashes for longer ids
        while id.len() < self.min_len {
            digest = Sha256::digest(digest);
            id.push_str(&bs58::encode(&digest).into_string());
        }
        id.truncate(self.min_len);

        Ok(id)
    }
}
