use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP transport settings (optional `[transport]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Seconds allowed for establishing a TCP/TLS connection.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a whole transfer.
    pub timeout_secs: u64,
    /// User-Agent header; libcurl's default when unset.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 300,
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/pooldl/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooldlConfig {
    /// Connections opened per batch (and downloads in flight at once).
    pub max_concurrency: usize,
    /// Directory downloads are written to; current directory when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Replace existing files instead of picking a free name.
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for PooldlConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            output_dir: None,
            overwrite: false,
            transport: TransportConfig::default(),
        }
    }
}

impl PooldlConfig {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pooldl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PooldlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PooldlConfig::default();
        let toml = default_cfg.to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PooldlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
