use serde::Deserialize;

use framewire_core::{FramewireError, Result};

use crate::popup::FEATURES_CONFIRM_WINDOW;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedConfig {
    /// Base URL of the wallet frame; also the origin of redirect popups.
    pub wallet_url: String,

    #[serde(default = "default_z_index")]
    pub z_index: u32,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub enable_logging: bool,

    #[serde(default = "default_confirm_features")]
    pub confirm_features: String,
}

impl EmbedConfig {
    pub fn new(wallet_url: impl Into<String>) -> Self {
        Self {
            wallet_url: wallet_url.into(),
            z_index: default_z_index(),
            network: NetworkConfig::default(),
            enable_logging: false,
            confirm_features: default_confirm_features(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.wallet_url.is_empty() {
            return Err(FramewireError::InvalidConfig(
                "wallet_url must not be empty".into(),
            ));
        }
        self.network.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub network_name: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            host: None,
            network_name: None,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.chain_id.starts_with("0x") {
            return Err(FramewireError::InvalidConfig(
                "network.chain_id must be a 0x-prefixed hex string".into(),
            ));
        }
        Ok(())
    }
}

fn default_z_index() -> u32 {
    99_999
}

fn default_chain_id() -> String {
    "0x3".into()
}

fn default_confirm_features() -> String {
    FEATURES_CONFIRM_WINDOW.into()
}
