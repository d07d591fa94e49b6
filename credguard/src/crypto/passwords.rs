//! Password hashing helpers built around Argon2id.
//! Every stored credential goes through `hash_password`, so the cost used for
//! new records is whatever `HashCost` the registrar was built with. The PHC
//! string carries its own parameters, which keeps old hashes verifiable after
//! the cost changes.

use std::fmt;

use argon2::password_hash::{self, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("argon2 rejected the input: {0}")]
    Argon2(#[from] password_hash::Error),
    #[error("stored hash is not valid UTF-8")]
    Encoding(#[source] std::string::FromUtf8Error),
}

/// Argon2id cost parameters. Defaults to the argon2 crate's standard
/// parameters (19 MiB, 2 iterations, 1 lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashCost {
    fn argon2(&self) -> Result<Argon2<'static>, password_hash::Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// PHC-encoded Argon2id hash as stored in the credential table.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn from_phc(phc: String) -> Self {
        Self(phc)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PasswordError> {
        String::from_utf8(bytes)
            .map(Self)
            .map_err(PasswordError::Encoding)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(<redacted>)")
    }
}

/// Hashes a password with a fresh random salt. Oversize input and invalid
/// cost parameters are reported, never truncated or clamped.
pub fn hash_password(plaintext: &str, cost: &HashCost) -> Result<HashedPassword, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = cost.argon2()?;
    let phc = argon2.hash_password(plaintext.as_bytes(), &salt)?.to_string();
    Ok(HashedPassword(phc))
}

/// Returns `true` when `plaintext` matches the stored hash. Malformed hashes
/// never match.
pub fn verify_password(plaintext: &str, stored: &HashedPassword) -> bool {
    let parsed = match PasswordHash::new(stored.as_str()) {
        Ok(hash) => hash,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
pub(crate) fn test_cost() -> HashCost {
    HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}
