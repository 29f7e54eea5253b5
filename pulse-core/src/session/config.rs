use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub node_url: String,
    pub faucet_url: String,
    pub balance_refresh_interval: Duration,
    pub transition_cooldown: Duration,
    pub deadline_grace: Duration,
    /// Seals the automation key at rest when set.
    #[serde(skip_serializing, default)]
    pub key_passphrase: Option<String>,
    pub database_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node_url: "http://localhost:8080".to_string(),
            faucet_url: "http://localhost:8079".to_string(),
            balance_refresh_interval: Duration::from_secs(5),
            transition_cooldown: Duration::from_secs(5),
            deadline_grace: Duration::from_secs(2),
            key_passphrase: None,
            database_file: "pulse.db".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn testnet() -> Self {
        Self {
            node_url: "https://testnet-conway.linera.net".to_string(),
            faucet_url: "https://faucet.testnet-conway.linera.net".to_string(),
            ..Self::default()
        }
    }

    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.key_passphrase = passphrase.filter(|p| !p.is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_url.is_empty() {
            return Err(PulseError::config("Node URL cannot be empty"));
        }

        if self.faucet_url.is_empty() {
            return Err(PulseError::config("Faucet URL cannot be empty"));
        }

        if self.balance_refresh_interval.is_zero() {
            return Err(PulseError::config(
                "Balance refresh interval must be greater than 0",
            ));
        }

        if self.transition_cooldown.is_zero() {
            return Err(PulseError::config("Transition cooldown must be greater than 0"));
        }

        if self.database_file.is_empty() {
            return Err(PulseError::config("Database file name cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        SessionConfig::local().validate().unwrap();
        SessionConfig::testnet().validate().unwrap();
    }

    #[test]
    fn test_invalid_config() {
        let mut config = SessionConfig::default();
        config.node_url.clear();
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.transition_cooldown = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_passphrase_is_ignored() {
        let config = SessionConfig::default().with_passphrase(Some(String::new()));
        assert!(config.key_passphrase.is_none());
    }
}
