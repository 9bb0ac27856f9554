//! `pooldl config` – show where the config lives and what it contains.

use anyhow::Result;
use pooldl_core::config::{self, PooldlConfig};

pub fn run_config(cfg: &PooldlConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", cfg.to_toml()?);
    Ok(())
}
