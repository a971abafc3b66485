//! Store configuration (`config.json`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::chunking::{DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS};
use crate::error::Result;
use crate::io;

/// Current config schema version. Bumped when a migration adds or
/// reshapes a field.
pub const CONFIG_VERSION: u32 = 1;

/// Default temporal decay half-life, in days.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 14.0;

/// Top-level store configuration.
///
/// Every field has a `#[serde(default)]` so a config written by an older
/// version still loads: missing fields take their documented default
/// rather than failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Ollama oracle connection settings.
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Chunker sizing defaults.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Temporal decay settings for retrieval.
    #[serde(default)]
    pub decay: DecayConfig,
    /// Pack-mode section weight tables, keyed by mode name then section
    /// name.
    #[serde(default = "default_pack_modes")]
    pub pack_modes: BTreeMap<String, BTreeMap<String, f64>>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Ollama endpoint and model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for embedding requests.
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Model used for chat/summarization requests.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_chat_model() -> String {
    "llama3".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            chat_model: default_chat_model(),
        }
    }
}

/// Default chunker sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Overlap tokens carried into the next chunk.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

const fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
const fn default_overlap_tokens() -> usize {
    DEFAULT_OVERLAP_TOKENS
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

/// Retrieval temporal decay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Whether decay is applied by default.
    #[serde(default = "default_decay_enabled")]
    pub enabled: bool,
    /// Half-life, in days, of the decay multiplier.
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
}

const fn default_decay_enabled() -> bool {
    true
}
const fn default_half_life_days() -> f64 {
    DEFAULT_HALF_LIFE_DAYS
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: default_decay_enabled(),
            half_life_days: default_half_life_days(),
        }
    }
}

fn default_pack_modes() -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut modes = BTreeMap::new();
    modes.insert("auto".to_string(), weights(0.15, 0.15, 0.15, 0.15, 0.40));
    modes.insert("debug".to_string(), weights(0.10, 0.05, 0.05, 0.05, 0.75));
    modes.insert("build".to_string(), weights(0.15, 0.20, 0.20, 0.20, 0.25));
    modes.insert("explore".to_string(), weights(0.25, 0.15, 0.05, 0.15, 0.40));
    modes
}

fn weights(
    project_state: f64,
    decisions: f64,
    active_tasks: f64,
    plans: f64,
    recent_context: f64,
) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("project_state".to_string(), project_state),
        ("decisions".to_string(), decisions),
        ("active_tasks".to_string(), active_tasks),
        ("plans".to_string(), plans),
        ("recent_context".to_string(), recent_context),
    ])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            decay: DecayConfig::default(),
            pack_modes: default_pack_modes(),
        }
    }
}

impl Config {
    /// Loads config from `path`, or returns the default config if the
    /// file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = io::read_file(path)?;
        let config = serde_json::from_str(&content).map_err(crate::error::StorageError::from)?;
        Ok(config)
    }

    /// Writes this config to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(crate::error::StorageError::from)?;
        io::write_file(path, &content)
    }

    /// Returns the section weight table for `mode`, falling back to
    /// `auto`'s weights if `mode` is unrecognized.
    #[must_use]
    pub fn weights_for_mode(&self, mode: &str) -> BTreeMap<String, f64> {
        self.pack_modes
            .get(mode)
            .or_else(|| self.pack_modes.get("auto"))
            .cloned()
            .unwrap_or_else(|| weights(0.15, 0.15, 0.15, 0.15, 0.40))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_defaults() {
        let config = Config::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.chunking.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(config.decay.enabled);
    }

    #[test]
    fn load_or_default_returns_default_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let mut config = Config::default();
        config.chunking.max_tokens = 999;
        config.save(&path).unwrap();
        let loaded = Config::load_or_default(&path).unwrap();
        assert_eq!(loaded.chunking.max_tokens, 999);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"version": 1}"#).unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.chunking.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
    }

    #[test]
    fn weights_for_unknown_mode_falls_back_to_auto() {
        let config = Config::default();
        let auto = config.weights_for_mode("auto");
        let unknown = config.weights_for_mode("bogus");
        assert_eq!(auto, unknown);
    }

    #[test]
    fn weights_for_debug_mode_match_spec_table() {
        let config = Config::default();
        let debug = config.weights_for_mode("debug");
        assert_eq!(debug["recent_context"], 0.75);
        assert_eq!(debug["project_state"], 0.10);
    }
}
