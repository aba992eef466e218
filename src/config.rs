//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$XOPACK_CONFIG` (environment variable)
//! 2. `~/.config/xopack/config.toml` (Linux/macOS)
//!    `%APPDATA%\xopack\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::attachment::policy::ExternalizationPolicy;
use crate::attachment::registry::DEFAULT_CID_DOMAIN;
use crate::attachment::SinkMode;
use crate::model::attachment::TransferEncoding;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Externalization decisions.
    pub sink: SinkConfig,
    /// XML output settings.
    pub marshal: MarshalConfig,
    /// MIME package layout.
    pub package: PackageConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Externalization decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// "inline-only" or "xop-optimizing".
    pub mode: SinkMode,
    /// Payloads smaller than this many bytes are always inlined.
    pub min_externalize_size: usize,
    /// Content types that are always inlined (`type/*` allowed).
    pub inline_content_types: Vec<String>,
    /// Element local names whose content is always inlined.
    pub inline_elements: Vec<String>,
    /// Domain part of generated content-ids.
    pub cid_domain: String,
}

/// XML output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// Pretty-print the XML.
    pub indent: bool,
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>`.
    pub write_declaration: bool,
    /// Inline a binary value when the sink fails to store it. Never applies
    /// to swaRef values.
    pub inline_on_attachment_error: bool,
    /// Maximum element nesting depth.
    pub max_depth: usize,
}

/// MIME package layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Content-Transfer-Encoding for attachment parts: "binary" or "base64".
    pub transfer_encoding: TransferEncoding,
    /// Media type of the original root document (`start-info`).
    pub start_info: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            mode: SinkMode::XopOptimizing,
            min_externalize_size: 1024, // 1 KB
            inline_content_types: Vec::new(),
            inline_elements: Vec::new(),
            cid_domain: DEFAULT_CID_DOMAIN.to_string(),
        }
    }
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            indent: false,
            write_declaration: true,
            inline_on_attachment_error: false,
            max_depth: 256,
        }
    }
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            transfer_encoding: TransferEncoding::Binary,
            start_info: "text/xml".to_string(),
        }
    }
}

impl SinkConfig {
    /// Build the externalization policy described by this section.
    pub fn policy(&self) -> ExternalizationPolicy {
        ExternalizationPolicy {
            min_size: self.min_externalize_size,
            inline_content_types: self.inline_content_types.clone(),
            inline_elements: self.inline_elements.clone(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

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

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("XOPACK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("xopack").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("xopack")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("xopack.log")
}
