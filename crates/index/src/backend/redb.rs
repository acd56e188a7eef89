//! Redb backend for persistent chunk storage.
//!
//! Redb is a pure Rust embedded key-value store with ACID transactions, so
//! the chunk index survives restarts without an external database.
//!
//! ```yaml
//! index:
//!   backend: "redb"
//!   path: "./data/chunks.redb"
//! ```

use crate::{IndexBackend, IndexError};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const CHUNK_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("plant_chunks");

/// Redb-backed [`IndexBackend`]. Every write is its own committed transaction,
/// except [`batch_put`](IndexBackend::batch_put) which commits once.
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create a database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let db = Database::create(path).map_err(IndexError::backend)?;

        // Opening the table inside a write transaction creates it.
        let write_txn = db.begin_write().map_err(IndexError::backend)?;
        {
            let _table = write_txn
                .open_table(CHUNK_TABLE)
                .map_err(IndexError::backend)?;
        }
        write_txn.commit().map_err(IndexError::backend)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl IndexBackend for RedbBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::backend)?;
        {
            let mut table = write_txn
                .open_table(CHUNK_TABLE)
                .map_err(IndexError::backend)?;
            table.insert(key, value).map_err(IndexError::backend)?;
        }
        write_txn.commit().map_err(IndexError::backend)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::backend)?;
        let table = read_txn
            .open_table(CHUNK_TABLE)
            .map_err(IndexError::backend)?;
        let value = table.get(key).map_err(IndexError::backend)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn delete(&self, key: &str) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::backend)?;
        {
            let mut table = write_txn
                .open_table(CHUNK_TABLE)
                .map_err(IndexError::backend)?;
            table.remove(key).map_err(IndexError::backend)?;
        }
        write_txn.commit().map_err(IndexError::backend)?;
        Ok(())
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::backend)?;
        {
            let mut table = write_txn
                .open_table(CHUNK_TABLE)
                .map_err(IndexError::backend)?;
            for (key, value) in entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(IndexError::backend)?;
            }
        }
        write_txn.commit().map_err(IndexError::backend)?;
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<bool, IndexError>,
    ) -> Result<(), IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::backend)?;
        let table = read_txn
            .open_table(CHUNK_TABLE)
            .map_err(IndexError::backend)?;

        for item in table.range(prefix..).map_err(IndexError::backend)? {
            let (key, value) = item.map_err(IndexError::backend)?;
            let key = key.value();
            if !key.starts_with(prefix) || !visitor(key, value.value())? {
                break;
            }
        }
        Ok(())
    }
}
