//! Configuration management for the CLI
//!
//! Defaults come from `~/.config/kube-capacity/config.json`, overridden by
//! `KUBE_CAPACITY_*` environment variables, overridden in turn by flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "KUBE_CAPACITY";

/// CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format (table, json, tsv, csv)
    pub default_output: Option<String>,
    /// Default sort key
    pub default_sort: Option<String>,
    /// List pods under each node
    pub show_pods: bool,
    /// Include utilization from metrics-server
    pub show_util: bool,
    /// Default namespace filter
    pub namespace: Option<String>,
    /// Default kubeconfig context
    pub context: Option<String>,
}

impl Config {
    /// Load configuration from the default file and the environment
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_layered(&path, None)
    }

    /// Layer `path` under environment variables.
    ///
    /// `env` replaces the process environment when given.
    pub fn load_layered(path: &Path, env: Option<config::Map<String, String>>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::new(&path.to_string_lossy(), config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("kube-capacity").join("config.json"))
    }
}
