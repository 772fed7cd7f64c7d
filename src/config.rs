//! Ambient front-end configuration — tuning knobs for things the format
//! never specifies (home-resolution policy aside, which stays in
//! `home.rs`): the Markdown export's session-gap threshold, and the
//! default counts `tail`/`pop`/`head` fall back to when the CLI is
//! called with no explicit `n`. Layered: built-in defaults, overlaid by
//! an optional TOML file, overlaid by environment variables.

use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

const CONFIG_PATH_VAR: &str = "OATS_CONFIG";
const CONFIG_FILENAME: &str = "config.toml";
const GAP_MINUTES_VAR: &str = "OATS_MARKDOWN_GAP_MINUTES";
const DEFAULT_COUNT_VAR: &str = "OATS_DEFAULT_COUNT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("invalid config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("{0}={1:?} is not a valid integer")]
    InvalidEnvInt(&'static str, String),
}

/// Deserializes from a TOML document where every field is optional, so a
/// config file only needs to mention the knobs it wants to override.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    markdown_gap_minutes: Option<i64>,
    default_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Minutes of silence inside a Markdown group before a fresh time
    /// header is emitted.
    pub markdown_gap_minutes: i64,
    /// Item count `tail`/`pop`/`head` use when the CLI omits `n`.
    pub default_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { markdown_gap_minutes: 8, default_count: 10 }
    }
}

impl Config {
    /// `$OATS_CONFIG` if set, else a platform config dir shared with the
    /// primary database's override var (`home::store_path`'s `$OATS_DB`
    /// sibling). Returns `None` only when neither the override var nor a
    /// resolvable platform config dir exist — no config file is then
    /// consulted and defaults apply.
    pub fn file_path() -> Option<PathBuf> {
        if let Ok(p) = env::var(CONFIG_PATH_VAR) {
            return Some(PathBuf::from(p));
        }
        directories::ProjectDirs::from("", "", "oat").map(|d| d.config_dir().join(CONFIG_FILENAME))
    }

    /// Load defaults, overlay a config file if one exists and parses,
    /// then overlay environment variables. A missing config file is not
    /// an error; a present-but-unparsable one is.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(path) = Self::file_path() {
            if path.exists() {
                let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
                let file: FileConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse(path, e))?;
                if let Some(v) = file.markdown_gap_minutes {
                    cfg.markdown_gap_minutes = v;
                }
                if let Some(v) = file.default_count {
                    cfg.default_count = v;
                }
            }
        }

        if let Ok(raw) = env::var(GAP_MINUTES_VAR) {
            cfg.markdown_gap_minutes =
                raw.parse().map_err(|_| ConfigError::InvalidEnvInt(GAP_MINUTES_VAR, raw))?;
        }
        if let Ok(raw) = env::var(DEFAULT_COUNT_VAR) {
            cfg.default_count =
                raw.parse().map_err(|_| ConfigError::InvalidEnvInt(DEFAULT_COUNT_VAR, raw))?;
        }

        Ok(cfg)
    }
}
