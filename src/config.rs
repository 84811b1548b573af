//! Run configuration loaded from `config.json`.
use crate::cli::RootArgs;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Target environment and the names used to build API routes.
///
/// Absent fields load as empty strings; emptiness is what gates each step of
/// the workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Config {
    /// Base URL of the environment, expected to end with `/`.
    pub(crate) environment_url: String,
    pub(crate) custom_api_name: String,
    pub(crate) entity_name: String,
}

impl Config {
    /// Apply CLI overrides on top of the file values.
    pub(crate) fn with_overrides(mut self, args: &RootArgs) -> Self {
        if let Some(url) = &args.url {
            self.environment_url = url.clone();
        }
        if let Some(name) = &args.custom_api {
            self.custom_api_name = name.clone();
        }
        if let Some(name) = &args.entity {
            self.entity_name = name.clone();
        }
        self
    }

    /// Presence check for the one field every run needs.
    pub(crate) fn ensure_environment_url(&self) -> Result<()> {
        if self.environment_url.trim().is_empty() {
            return Err(anyhow!("environmentUrl is missing from config"));
        }
        Ok(())
    }

    /// Route for a custom API or entity set under the Web API root.
    pub(crate) fn api_url(&self, name: &str) -> String {
        format!("{}api/data/v9.0/{}", self.environment_url, name)
    }
}

/// Read and parse the config file.
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: Config = serde_json::from_slice(&bytes).context("parse config JSON")?;
    tracing::debug!(
        path = %path.display(),
        environment_url = %config.environment_url,
        custom_api_name = %config.custom_api_name,
        entity_name = %config.entity_name,
        "config loaded"
    );
    Ok(config)
}
