//! Credential registration: normalize, pre-check, hash, insert.
//!
//! The existence check only produces the friendly `DuplicateEmail` error for
//! the common case. Two racing registrations for the same email can both pass
//! it, in which case the backend's uniqueness constraint rejects the loser and
//! the error surfaces as `Backend(UniqueViolation)`. Use
//! [`RegistrationError::is_duplicate`] to treat both the same way.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::context::CallContext;
use crate::crypto::passwords::{hash_password, HashCost, PasswordError};
use crate::repository::{CredentialRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("credential backend failed: {0}")]
    Backend(#[source] RepositoryError),
    #[error("password hashing failed: {0}")]
    Hashing(#[source] PasswordError),
}

impl RegistrationError {
    /// True for the pre-check sentinel and for a uniqueness violation raised
    /// by the backend at insert time.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEmail | Self::Backend(RepositoryError::UniqueViolation { .. })
        )
    }

    /// True for backend failures that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend(RepositoryError::Storage(_) | RepositoryError::Aborted(_))
        )
    }
}

/// Removes every whitespace character, including interior ones. Case is
/// kept. Any path that looks credentials up by email must use this too.
pub fn normalize_email(email: &str) -> String {
    email.chars().filter(|c| !c.is_whitespace()).collect()
}

pub struct Registrar<R> {
    repository: R,
    cost: HashCost,
}

impl<R: CredentialRepository> Registrar<R> {
    pub fn new(repository: R) -> Self {
        Self::with_cost(repository, HashCost::default())
    }

    pub fn with_cost(repository: R, cost: HashCost) -> Self {
        Self { repository, cost }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn cost(&self) -> &HashCost {
        &self.cost
    }

    /// Registers a new credential. On success exactly one record has been
    /// persisted; on any error none has. No retries are attempted.
    pub fn register(
        &self,
        ctx: &CallContext,
        email: &str,
        plaintext_password: &str,
    ) -> Result<(), RegistrationError> {
        let email = normalize_email(email);
        debug!(email = %email, "registering credential");

        let exists = self
            .repository
            .exists_by_email(ctx, &email)
            .map_err(|err| {
                error!(email = %email, error = %err, "email existence check failed");
                RegistrationError::Backend(err)
            })?;
        if exists {
            warn!(email = %email, "registration rejected: email already exists");
            return Err(RegistrationError::DuplicateEmail);
        }

        let password_hash = hash_password(plaintext_password, &self.cost).map_err(|err| {
            error!(email = %email, error = %err, "password hashing failed");
            RegistrationError::Hashing(err)
        })?;

        self.repository
            .insert_credential(ctx, &email, &password_hash)
            .map_err(|err| {
                if matches!(err, RepositoryError::UniqueViolation { .. }) {
                    warn!(email = %email, "registration lost insert race: email already exists");
                } else {
                    error!(email = %email, error = %err, "credential insert failed");
                }
                RegistrationError::Backend(err)
            })?;

        info!(email = %email, "credential registered");
        Ok(())
    }
}
