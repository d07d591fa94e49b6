//! SQLite-backed credential store. The `email` primary key is the final
//! authority on duplicates; each insert is a single statement, so an aborted
//! call never leaves a partial row.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{CredentialRepository, RepositoryError};
use crate::context::CallContext;
use crate::crypto::passwords::HashedPassword;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteCredentialRepository {
    conn: Mutex<Connection>,
    busy_timeout: Duration,
}

impl SqliteCredentialRepository {
    /// Opens or creates the database at `path` and makes sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(RepositoryError::storage)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(RepositoryError::storage)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    /// Upper bound on how long a call waits for a locked database when the
    /// context carries no tighter deadline.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn password_hash(
        &self,
        ctx: &CallContext,
        email: &str,
    ) -> Result<Option<HashedPassword>, RepositoryError> {
        let conn = self.acquire(ctx)?;
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT password_hash FROM credentials WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(RepositoryError::storage)?;
        bytes
            .map(HashedPassword::from_bytes)
            .transpose()
            .map_err(RepositoryError::storage)
    }

    fn acquire(
        &self,
        ctx: &CallContext,
    ) -> Result<parking_lot::MutexGuard<'_, Connection>, RepositoryError> {
        ctx.check()?;
        let conn = self.conn.lock();
        // The lock wait may have eaten the deadline.
        ctx.check()?;
        let wait = ctx
            .remaining()
            .map_or(self.busy_timeout, |left| left.min(self.busy_timeout));
        conn.busy_timeout(wait).map_err(RepositoryError::storage)?;
        Ok(conn)
    }
}

impl CredentialRepository for SqliteCredentialRepository {
    fn exists_by_email(&self, ctx: &CallContext, email: &str) -> Result<bool, RepositoryError> {
        let conn = self.acquire(ctx)?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM credentials WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )
        .map_err(RepositoryError::storage)
    }

    fn insert_credential(
        &self,
        ctx: &CallContext,
        email: &str,
        password_hash: &HashedPassword,
    ) -> Result<(), RepositoryError> {
        let conn = self.acquire(ctx)?;
        conn.execute(
            "INSERT INTO credentials (email, password_hash, created_at)
             VALUES (?1, ?2, strftime('%s','now'))",
            params![email, password_hash.as_bytes()],
        )
        .map_err(|err| map_insert_err(err, email))?;
        Ok(())
    }
}

fn ensure_schema(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS credentials (
            email           TEXT    NOT NULL PRIMARY KEY,
            password_hash   BLOB    NOT NULL,
            created_at      INTEGER NOT NULL
        );",
    )
    .map_err(RepositoryError::storage)
}

fn map_insert_err(err: rusqlite::Error, email: &str) -> RepositoryError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) =>
        {
            RepositoryError::UniqueViolation {
                email: email.to_string(),
            }
        }
        _ => RepositoryError::storage(err),
    }
}
