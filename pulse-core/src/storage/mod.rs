pub mod chain_cache;
pub mod identity_store;

pub use chain_cache::ChainCache;
pub use identity_store::{IdentityKey, IdentityStore, PersistedIdentity};

use crate::error::{PulseError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PulseError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    pub async fn in_memory() -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Identity key-value pairs
        conn.execute(
            "CREATE TABLE IF NOT EXISTS identity (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Chains followed by the ledger client and their authorized owners
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chain_owners (
                chain_id TEXT NOT NULL,
                owner TEXT NOT NULL,
                added_at INTEGER NOT NULL,
                PRIMARY KEY (chain_id, owner)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Names of every user table in the database.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Deletes every row of every table, including tables created after the
    /// schema above. Returns the number of rows removed.
    pub async fn wipe_all(&self) -> Result<usize> {
        let tables = self.table_names().await?;
        let conn = self.conn.lock().await;

        let mut removed = 0;
        for table in &tables {
            let sql = format!("DELETE FROM \"{}\"", table.replace('"', "\"\""));
            let count = conn.execute(&sql, [])?;
            tracing::debug!("Cleared table {} ({} rows)", table, count);
            removed += count;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_wipe_all_clears_every_table() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("pulse.db")).await.unwrap();

        {
            let conn = storage.get_connection().await;
            conn.execute(
                "INSERT INTO identity (key, value, updated_at) VALUES ('chain_id', 'abc', 0)",
                [],
            )
            .unwrap();
            conn.execute(
                "CREATE TABLE extra_cache (k TEXT PRIMARY KEY, v TEXT)",
                [],
            )
            .unwrap();
            conn.execute("INSERT INTO extra_cache (k, v) VALUES ('a', 'b')", [])
                .unwrap();
        }

        let removed = storage.wipe_all().await.unwrap();
        assert_eq!(removed, 2);

        let conn = storage.get_connection().await;
        for table in ["identity", "chain_owners", "extra_cache"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "table {} not empty", table);
        }
    }
}
