//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "endpoint": "https://www.hackingwithswift.com/samples/friendface.json" }
//! }
//! ```
//! Keys this crate doesn't manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::http::{validate_endpoint, DEFAULT_ENDPOINT};

/// Environment variable overriding the feed endpoint
pub const ENDPOINT_ENV: &str = "FRIENDFACE_ENDPOINT";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "FRIENDFACE_DIR";

pub const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// FriendFace configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Profile feed URL, already validated
    pub endpoint: String,
    /// Endpoint from settings.json, before any env override
    stored_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            stored_endpoint: None,
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// The endpoint comes from `FRIENDFACE_ENDPOINT` if set, then
    /// `app.endpoint` in settings.json, then the public sample feed.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let env_endpoint = std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty());
        Self::load_with_override(data_dir, env_endpoint)
    }

    fn load_with_override(data_dir: &Path, env_endpoint: Option<String>) -> Result<Self> {
        let raw = read_settings(data_dir)?;

        let endpoint = env_endpoint
            .or_else(|| raw.app.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        validate_endpoint(&endpoint)?;

        Ok(Self {
            endpoint,
            stored_endpoint: raw.app.endpoint,
        })
    }

    /// Change the endpoint after validating it
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        validate_endpoint(endpoint)?;
        self.endpoint = endpoint.to_string();
        self.stored_endpoint = Some(endpoint.to_string());
        Ok(())
    }

    /// Save to settings.json, keeping keys this crate doesn't manage
    ///
    /// An env override is never persisted; only an endpoint set through
    /// `set_endpoint` or read from the file is written back.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir)?;
        settings.app.endpoint = self.stored_endpoint.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join(SETTINGS_FILENAME), content)?;
        Ok(())
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILENAME);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read {}", settings_path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid settings file {}", settings_path.display()))
}
