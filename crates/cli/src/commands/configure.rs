//! Configuration file commands

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::output::{print_info, print_success};

/// Print the effective configuration (file plus environment)
pub fn show_config() -> Result<()> {
    let config = Config::load()?;
    let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", json);
    Ok(())
}

/// Print where the configuration file lives
pub fn show_path() -> Result<()> {
    let path = Config::config_path()?;
    println!("{}", path.display());
    if !path.exists() {
        print_info("File does not exist yet; run `kube-capacity config init` to create it");
    }
    Ok(())
}

/// Write a configuration file with default values
pub fn init_config(force: bool) -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }

    let written = Config::default().save()?;
    print_success(&format!("Wrote {}", written.display()));
    Ok(())
}
