//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...`) that carry their own salt
//! and parameters, so verification needs nothing but the stored value.

use std::sync::Arc;

use argon2::{
    password_hash::{
        self, rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::config::PasswordConfig;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),

    #[error("failed to hash password: {0}")]
    Hash(password_hash::Error),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(password_hash::Error),
}

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    // Verified against on unknown usernames so both login failures cost the same
    dummy_hash: Arc<OnceCell<String>>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }
}

impl PasswordHasher {
    pub fn new(memory_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params =
            Params::new(memory_cost_kib, time_cost, parallelism, None).map_err(PasswordError::Params)?;
        Ok(Self {
            params,
            dummy_hash: Arc::new(OnceCell::new()),
        })
    }

    pub fn from_config(config: &PasswordConfig) -> Result<Self, PasswordError> {
        Self::new(config.memory_cost_kib, config.time_cost, config.parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordError::Hash)?;
        Ok(hash.to_string())
    }

    /// Constant-time check of `password` against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; only an unreadable hash is an error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(PasswordError::MalformedHash)?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedHash(e)),
        }
    }

    /// Burn one verification's worth of work without a real account
    pub fn verify_dummy(&self, password: &str) -> Result<(), PasswordError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash("dummy-password-for-timing"))?;
        self.verify(password, hash).map(|_| ())
    }
}
