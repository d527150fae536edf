//! Embed config loader (strict parsing).

pub mod schema;

use std::fs;

use framewire_core::{FramewireError, Result};

pub use schema::{EmbedConfig, NetworkConfig};

pub fn load_from_file(path: &str) -> Result<EmbedConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| FramewireError::InvalidConfig(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<EmbedConfig> {
    let cfg: EmbedConfig = serde_yaml::from_str(s)
        .map_err(|e| FramewireError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
