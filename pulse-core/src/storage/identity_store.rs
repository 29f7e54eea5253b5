use crate::error::{PulseError, Result};
use crate::storage::Storage;
use crate::types::{Address, Amount, ChainId};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

/// Keys persisted for the connected identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    ChainId,
    PrimaryAddress,
    AutomationKey,
    AutomationRegistered,
    Balance,
}

impl IdentityKey {
    pub const ALL: [IdentityKey; 5] = [
        IdentityKey::ChainId,
        IdentityKey::PrimaryAddress,
        IdentityKey::AutomationKey,
        IdentityKey::AutomationRegistered,
        IdentityKey::Balance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKey::ChainId => "chain_id",
            IdentityKey::PrimaryAddress => "primary_address",
            IdentityKey::AutomationKey => "automation_key",
            IdentityKey::AutomationRegistered => "automation_registered",
            IdentityKey::Balance => "balance",
        }
    }
}

/// Identity as read back from storage.
#[derive(Debug, Clone)]
pub struct PersistedIdentity {
    pub chain_id: ChainId,
    pub primary_address: Address,
    pub automation_key: Option<String>,
    pub automation_registered: bool,
    pub balance: Option<Amount>,
}

pub struct IdentityStore<'a> {
    storage: &'a Storage,
}

impl<'a> IdentityStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn get(&self, key: IdentityKey) -> Result<Option<String>> {
        let conn = self.storage.get_connection().await;

        let value = conn
            .query_row(
                "SELECT value FROM identity WHERE key = ?1",
                params![key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    pub async fn set(&self, key: IdentityKey, value: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO identity (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), value, Utc::now().timestamp()],
        )?;

        Ok(())
    }

    pub async fn remove(&self, key: IdentityKey) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "DELETE FROM identity WHERE key = ?1",
            params![key.as_str()],
        )?;
        Ok(())
    }

    /// Keys currently present, in storage order.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT key FROM identity ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    /// Writes the identity established by a fresh connection in one
    /// transaction, replacing whatever was there.
    pub async fn save_connection(
        &self,
        chain_id: &ChainId,
        primary_address: &Address,
        automation_key: &str,
    ) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let now = Utc::now().timestamp();

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM identity", [])?;
        for (key, value) in [
            (IdentityKey::ChainId, chain_id.as_str()),
            (IdentityKey::PrimaryAddress, primary_address.as_str()),
            (IdentityKey::AutomationKey, automation_key),
            (IdentityKey::AutomationRegistered, "false"),
        ] {
            tx.execute(
                "INSERT INTO identity (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key.as_str(), value, now],
            )?;
        }
        tx.commit()?;

        Ok(())
    }

    /// Returns the stored identity when both the chain and the primary
    /// address are present.
    pub async fn load(&self) -> Result<Option<PersistedIdentity>> {
        let chain_id = self.get(IdentityKey::ChainId).await?;
        let primary = self.get(IdentityKey::PrimaryAddress).await?;

        let (chain_id, primary) = match (chain_id, primary) {
            (Some(chain_id), Some(primary)) => (chain_id, primary),
            _ => return Ok(None),
        };

        let primary_address = Address::parse(&primary)?;
        let automation_key = self.get(IdentityKey::AutomationKey).await?;
        let automation_registered = self
            .get(IdentityKey::AutomationRegistered)
            .await?
            .map(|v| v == "true")
            .unwrap_or(false);
        let balance = match self.get(IdentityKey::Balance).await? {
            Some(raw) => Some(raw.parse::<Amount>().map_err(|e| {
                PulseError::internal(format!("Corrupt cached balance: {}", e))
            })?),
            None => None,
        };

        Ok(Some(PersistedIdentity {
            chain_id: ChainId::new(chain_id),
            primary_address,
            automation_key,
            automation_registered,
            balance,
        }))
    }

    pub async fn mark_automation_registered(&self) -> Result<()> {
        self.set(IdentityKey::AutomationRegistered, "true").await
    }

    pub async fn cache_balance(&self, balance: Amount) -> Result<()> {
        self.set(IdentityKey::Balance, &balance.to_string()).await
    }
}
