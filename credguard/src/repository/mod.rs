//! Persistence seam for credential records.
//!
//! The registrar only needs an existence check and an insert. Backends must
//! enforce email uniqueness atomically on insert: the registrar's existence
//! check is a best-effort pre-check and two concurrent registrations can both
//! pass it.

mod memory;
mod sqlite;

pub use memory::InMemoryCredentialRepository;
pub use sqlite::SqliteCredentialRepository;

use thiserror::Error;

use crate::context::{CallContext, ContextError};
use crate::crypto::passwords::HashedPassword;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("a credential already exists for {email}")]
    UniqueViolation { email: String },
    #[error("backend call aborted: {0}")]
    Aborted(#[from] ContextError),
    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Storage for credential records keyed by normalized email.
pub trait CredentialRepository: Send + Sync {
    fn exists_by_email(&self, ctx: &CallContext, email: &str) -> Result<bool, RepositoryError>;

    /// Inserts a new record. A record with the same email must fail with
    /// `RepositoryError::UniqueViolation` and leave the existing one intact.
    fn insert_credential(
        &self,
        ctx: &CallContext,
        email: &str,
        password_hash: &HashedPassword,
    ) -> Result<(), RepositoryError>;
}
