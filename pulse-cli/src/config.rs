use pulse_core::{ApplicationId, PulseError, Result, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const PASSPHRASE_ENV: &str = "PULSE_KEY_PASSPHRASE";
pub const MNEMONIC_ENV: &str = "PULSE_PRIMARY_MNEMONIC";
pub const COLOR_APP_ENV: &str = "PULSE_COLOR_APP_ID";
pub const BINGO_APP_ENV: &str = "PULSE_BINGO_APP_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub testnet: bool,
    pub node_url: Option<String>,
    pub faucet_url: Option<String>,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pulse"),
            testnet: false,
            node_url: None,
            faucet_url: None,
            verbose: false,
        }
    }
}

impl CliConfig {
    /// Session settings: preset, then flag overrides, then the passphrase
    /// from the environment.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut config = if self.testnet {
            SessionConfig::testnet()
        } else {
            SessionConfig::local()
        };

        if let Some(node) = &self.node_url {
            config.node_url = node.clone();
        }
        if let Some(faucet) = &self.faucet_url {
            config.faucet_url = faucet.clone();
        }

        let config = config.with_passphrase(std::env::var(PASSPHRASE_ENV).ok());
        config.validate()?;
        Ok(config)
    }
}

/// Application id from the flag, falling back to the environment.
pub fn application_id(flag: Option<String>, env: &str) -> Result<ApplicationId> {
    flag.or_else(|| std::env::var(env).ok())
        .filter(|id| !id.trim().is_empty())
        .map(|id| ApplicationId::new(id.trim()))
        .ok_or_else(|| {
            PulseError::config(format!("No application id: pass --app or set {}", env))
        })
}
