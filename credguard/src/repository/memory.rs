use std::collections::hash_map::Entry;
use std::collections::HashMap;

use parking_lot::Mutex;

use super::{CredentialRepository, RepositoryError};
use crate::context::CallContext;
use crate::crypto::passwords::HashedPassword;

/// Process-local credential store. Uniqueness is enforced under the same lock
/// as the insert.
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    records: Mutex<HashMap<String, HashedPassword>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn password_hash(&self, email: &str) -> Option<HashedPassword> {
        self.records.lock().get(email).cloned()
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn exists_by_email(&self, ctx: &CallContext, email: &str) -> Result<bool, RepositoryError> {
        ctx.check()?;
        Ok(self.records.lock().contains_key(email))
    }

    fn insert_credential(
        &self,
        ctx: &CallContext,
        email: &str,
        password_hash: &HashedPassword,
    ) -> Result<(), RepositoryError> {
        ctx.check()?;
        match self.records.lock().entry(email.to_string()) {
            Entry::Occupied(_) => Err(RepositoryError::UniqueViolation {
                email: email.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(password_hash.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryCredentialRepository;
    use crate::context::{CallContext, ContextError};
    use crate::crypto::passwords::HashedPassword;
    use crate::repository::{CredentialRepository, RepositoryError};

    fn hash(tag: &str) -> HashedPassword {
        HashedPassword::from_phc(format!("$argon2id$v=19$fake${tag}"))
    }

    #[test]
    fn inserts_and_finds_records() {
        let repo = InMemoryCredentialRepository::new();
        let ctx = CallContext::background();
        assert!(!repo.exists_by_email(&ctx, "a@x.com").expect("exists"));

        repo.insert_credential(&ctx, "a@x.com", &hash("a")).expect("insert");
        assert!(repo.exists_by_email(&ctx, "a@x.com").expect("exists"));
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.password_hash("a@x.com"), Some(hash("a")));
    }

    #[test]
    fn second_insert_is_a_unique_violation() {
        let repo = InMemoryCredentialRepository::new();
        let ctx = CallContext::background();
        repo.insert_credential(&ctx, "a@x.com", &hash("first")).expect("insert");

        let err = repo
            .insert_credential(&ctx, "a@x.com", &hash("second"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueViolation { ref email } if email == "a@x.com"));
        assert_eq!(repo.password_hash("a@x.com"), Some(hash("first")));
    }

    #[test]
    fn emails_are_case_sensitive() {
        let repo = InMemoryCredentialRepository::new();
        let ctx = CallContext::background();
        repo.insert_credential(&ctx, "A@x.com", &hash("upper")).expect("insert");
        repo.insert_credential(&ctx, "a@x.com", &hash("lower")).expect("insert");
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn cancelled_context_writes_nothing() {
        let repo = InMemoryCredentialRepository::new();
        let ctx = CallContext::background();
        ctx.cancel();

        let err = repo.insert_credential(&ctx, "a@x.com", &hash("a")).unwrap_err();
        assert!(matches!(err, RepositoryError::Aborted(ContextError::Cancelled)));
        assert!(repo.is_empty());
    }
}
