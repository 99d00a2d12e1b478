//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EMLSHELL_CONFIG` (environment variable)
//! 2. `~/.config/emlshell/config.toml` (Linux/macOS)
//!    `%APPDATA%\emlshell\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::parser::part::{ParseOptions, DEFAULT_MAX_BOUNDARIES, DEFAULT_MAX_DEPTH};
use crate::parser::repair::{LiteralIso2022Jp, NoRepair, TextRepair};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// MIME parsing limits and heuristics.
    pub parser: ParserConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// MIME parsing limits and heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Boundary occurrences scanned per multipart body.
    pub max_boundaries: usize,
    /// Deepest MIME nesting accepted.
    pub max_depth: usize,
    /// Recover literal ISO-2022-JP escape text in Japanese bodies.
    pub repair_iso2022jp: bool,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output directory for `attachments`.
    pub default_output_dir: Option<PathBuf>,
    /// Sub-directory (of the output directory) for inline images.
    pub inline_images_dir_name: String,
    /// Longest file name written, in characters.
    pub max_filename_len: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_boundaries: DEFAULT_MAX_BOUNDARIES,
            max_depth: DEFAULT_MAX_DEPTH,
            repair_iso2022jp: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_output_dir: None,
            inline_images_dir_name: "inline".to_string(),
            max_filename_len: 150,
        }
    }
}

impl ParserConfig {
    /// Parse options matching these settings.
    pub fn parse_options(&self) -> ParseOptions {
        let repair: Arc<dyn TextRepair> = if self.repair_iso2022jp {
            Arc::new(LiteralIso2022Jp::new())
        } else {
            Arc::new(NoRepair)
        };
        ParseOptions {
            max_boundaries: self.max_boundaries,
            max_depth: self.max_depth,
            repair,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EMLSHELL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("emlshell").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emlshell")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("emlshell.log")
}
