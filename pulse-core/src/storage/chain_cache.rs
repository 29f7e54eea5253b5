use crate::error::Result;
use crate::storage::Storage;
use crate::types::{Address, ChainId};
use chrono::Utc;
use rusqlite::params;

/// Local record of the owners the ledger client has registered per chain.
pub struct ChainCache<'a> {
    storage: &'a Storage,
}

impl<'a> ChainCache<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn record_owner(&self, chain_id: &ChainId, owner: &Address) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR IGNORE INTO chain_owners (chain_id, owner, added_at) VALUES (?1, ?2, ?3)",
            params![chain_id.as_str(), owner.as_str(), Utc::now().timestamp()],
        )?;

        Ok(())
    }

    pub async fn owners(&self, chain_id: &ChainId) -> Result<Vec<Address>> {
        let conn = self.storage.get_connection().await;

        let mut stmt =
            conn.prepare("SELECT owner FROM chain_owners WHERE chain_id = ?1 ORDER BY added_at")?;
        let raw = stmt
            .query_map(params![chain_id.as_str()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.iter().map(|owner| Address::parse(owner)).collect()
    }
}
