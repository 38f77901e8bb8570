use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Interface whose implementers get flagged
pub const DEFAULT_MARKER_CAPABILITY: &str = "ISensitiveObject";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write config: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Exact simple name of the marker interface
    #[serde(default = "default_marker_capability")]
    pub marker_capability: String,
    /// Reference manifests loaded next to the core library. Paths are
    /// machine specific; a missing one turns every scan into a no-op.
    #[serde(default)]
    pub extension_references: Vec<PathBuf>,
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
    /// Per-document parse budget; unset means no limit
    #[serde(default)]
    pub parse_timeout_micros: Option<u64>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            marker_capability: default_marker_capability(),
            extension_references: Vec::new(),
            file_extensions: default_file_extensions(),
            respect_gitignore: true,
            parse_timeout_micros: None,
        }
    }
}

fn default_marker_capability() -> String {
    DEFAULT_MARKER_CAPABILITY.to_string()
}

fn default_file_extensions() -> Vec<String> {
    vec!["cs".to_string()]
}

fn default_true() -> bool {
    true
}

pub fn default_config_path() -> PathBuf {
    let Some(dirs) = ProjectDirs::from("com", "wavedev", "sensitive-marker") else {
        return Path::new("sensitive-marker.json").to_path_buf();
    };
    dirs.config_dir().join("config.json")
}

/// Load the config at `path`, falling back to defaults when it is missing
/// or unreadable
pub fn load_config(path: &Path) -> MarkerConfig {
    let Ok(bytes) = fs::read(path) else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return MarkerConfig::default();
    };
    serde_json::from_slice::<MarkerConfig>(&bytes).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
        MarkerConfig::default()
    })
}

pub fn save_config(path: &Path, cfg: &MarkerConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_vec_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config(&dir.path().join("absent.json"));
        assert_eq!(cfg, MarkerConfig::default());
        assert_eq!(cfg.marker_capability, "ISensitiveObject");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.json");
        let cfg = MarkerConfig {
            extension_references: vec![PathBuf::from("refs/System.Core.json")],
            parse_timeout_micros: Some(50_000),
            ..MarkerConfig::default()
        };

        save_config(&path, &cfg).unwrap();
        assert_eq!(load_config(&path), cfg);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "respect_gitignore": false }"#).unwrap();

        let cfg = load_config(&path);
        assert!(!cfg.respect_gitignore);
        assert_eq!(cfg.file_extensions, vec!["cs"]);
        assert_eq!(cfg.marker_capability, DEFAULT_MARKER_CAPABILITY);
    }

    #[test]
    fn test_garbage_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(load_config(&path), MarkerConfig::default());
    }
}
