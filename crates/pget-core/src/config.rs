use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_chunk_size() -> u64 {
    8192
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_read_timeout() -> u64 {
    45
}

/// Global configuration loaded from `~/.config/pget/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgetConfig {
    /// Transfer and progress-tracking unit in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// HTTP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Abort a transfer when the stream delivers nothing for this many seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for PgetConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pget")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PgetConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PgetConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PgetConfig = toml::from_str(&data)?;
    Ok(cfg)
}
