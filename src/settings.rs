//! Application settings storage
//!
//! Stores configuration like API keys in a JSON file in the app data directory.
//! Nothing in the organize pipeline reads this module: callers resolve settings
//! into `OrganizeOptions` and a backend before starting a run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::ai_client::LlmBackend;
use crate::categorize::{ChunkOrder, OrganizeOptions};
use crate::error::SettingsError;
use crate::utils::mask_secret;

/// Keys accepted by `get` / `set`
pub const KEYS: &[&str] = &[
    "backend",
    "anthropic-api-key",
    "gemini-api-key",
    "model",
    "simple-categories",
    "clean-titles",
    "keep-order",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// LLM backend: "anthropic" or "gemini" (default: "anthropic")
    #[serde(default)]
    pub llm_backend: LlmBackend,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    /// Model override (None = backend default)
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub use_simple_categories: bool,
    #[serde(default)]
    pub clean_titles: bool,
    /// Re-sort each chunk's results to input order
    #[serde(default)]
    pub keep_input_order: bool,
}

/// Where an API key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Settings,
    None,
}

/// `<data_dir>/tidymarks/settings.json`, or `./settings.json` without a data dir
pub fn default_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("tidymarks"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("settings.json")
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Settings {
    /// Load settings from disk or create default
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("[Settings] Ignoring unreadable {}: {}", path.display(), e);
                Settings::default()
            }),
            Err(e) => {
                warn!("[Settings] Failed to read {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(self)?;

        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)?;

        debug!("[Settings] Saved {}", path.display());
        Ok(())
    }

    fn stored_api_key(&self) -> Option<&String> {
        match self.llm_backend {
            LlmBackend::Anthropic => self.anthropic_api_key.as_ref(),
            LlmBackend::Gemini => self.gemini_api_key.as_ref(),
        }
    }

    fn resolve_api_key(&self, env_value: Option<String>) -> (Option<String>, KeySource) {
        if let Some(key) = env_value.filter(|k| !k.is_empty()) {
            return (Some(key), KeySource::Env);
        }
        match self.stored_api_key().filter(|k| !k.is_empty()) {
            Some(key) => (Some(key.clone()), KeySource::Settings),
            None => (None, KeySource::None),
        }
    }

    /// API key for the selected backend (checks env var first, then stored setting)
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with_source().0
    }

    pub fn api_key_with_source(&self) -> (Option<String>, KeySource) {
        let env_value = std::env::var(self.llm_backend.api_key_env()).ok();
        self.resolve_api_key(env_value)
    }

    /// Get masked API key for display (shows first 8/last 4 chars)
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key().map(|key| mask_secret(&key))
    }

    pub fn organize_options(&self) -> OrganizeOptions {
        OrganizeOptions {
            use_simple_categories: self.use_simple_categories,
            clean_titles: self.clean_titles,
            chunk_order: if self.keep_input_order {
                ChunkOrder::Input
            } else {
                ChunkOrder::AsReturned
            },
        }
    }

    /// Display value for a key; secrets are masked
    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        let masked = |value: &Option<String>| {
            value
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| "not set".to_string())
        };
        Ok(match key {
            "backend" => self.llm_backend.to_string(),
            "anthropic-api-key" => masked(&self.anthropic_api_key),
            "gemini-api-key" => masked(&self.gemini_api_key),
            "model" => self
                .model
                .clone()
                .unwrap_or_else(|| format!("{} (default)", self.llm_backend.default_model())),
            "simple-categories" => self.use_simple_categories.to_string(),
            "clean-titles" => self.clean_titles.to_string(),
            "keep-order" => self.keep_input_order.to_string(),
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        })
    }

    /// Update a key from its string form. An empty value clears optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "backend" => {
                self.llm_backend = value.parse().map_err(|_| SettingsError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            }
            "anthropic-api-key" => self.anthropic_api_key = non_empty(value),
            "gemini-api-key" => self.gemini_api_key = non_empty(value),
            "model" => self.model = non_empty(value),
            "simple-categories" => self.use_simple_categories = parse_bool(key, value)?,
            "clean-titles" => self.clean_titles = parse_bool(key, value)?,
            "keep-order" => self.keep_input_order = parse_bool(key, value)?,
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}
