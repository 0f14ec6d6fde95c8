//! Scoped transactional access to the catalog database.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::debug;

use super::retry::{retry_on_lock, RetryPolicy};
use super::DatabaseError;

/// Opens one connection per call; no connection outlives the transaction it
/// was opened for, so handles are never shared between worker threads.
#[derive(Debug, Clone)]
pub struct CatalogGateway {
    path: PathBuf,
    busy_timeout: Duration,
    retry_base: Duration,
}

impl CatalogGateway {
    /// Verifies the catalog exists and can be opened read-write.
    pub fn open(
        path: &Path,
        busy_timeout: Duration,
        retry_base: Duration,
    ) -> Result<Self, DatabaseError> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DatabaseError::CatalogNotFound(path.to_path_buf()),
            _ => DatabaseError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        if !metadata.is_file() {
            return Err(DatabaseError::CatalogNotFound(path.to_path_buf()));
        }

        let gateway = Self {
            path: path.to_path_buf(),
            busy_timeout,
            retry_base,
        };
        gateway.connect()?;

        debug!("Catalog gateway ready for {}", path.display());
        Ok(gateway)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(conn)
    }

    /// Runs `f` inside a deferred transaction on a fresh connection.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. Lock contention
    /// anywhere in the attempt restarts it, at most `retries` times.
    pub fn with_transaction<T, F>(&self, retries: u32, mut f: F) -> Result<T, DatabaseError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, DatabaseError>,
    {
        let policy = RetryPolicy::new(retries, self.retry_base);
        retry_on_lock(&policy, |_| {
            let mut conn = self.connect()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}
