//! Shell configuration, loaded from a TOML file with CLI overrides on top.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::backend::SearchMode;
use crate::error::{Result, ShellError};

const CONFIG_DIR: &str = "lightbot-shell";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub general: GeneralConfig,
    pub backend: BackendConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    /// When set, logs also go to a daily-rotated file in this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Full base URL of the sidecar; takes precedence over `port`.
    pub base_url: Option<String>,
    /// Local port of the sidecar (the usual case: the shell that spawned the
    /// sidecar hands the port over at runtime).
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub search_mode: SearchMode,
}

impl ShellConfig {
    /// Default config file path (`~/.config/lightbot-shell/config.toml` on
    /// Linux), if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| ShellError::Config(format!("{}: {e}", path.display())))
    }

    /// Resolved backend base URL, if any source configured one.
    pub fn backend_base_url(&self) -> Option<String> {
        if let Some(url) = &self.backend.base_url {
            return Some(url.clone());
        }
        self.backend.port.map(|p| format!("http://127.0.0.1:{p}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_sane() {
        let config = ShellConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.chat.search_mode, SearchMode::Off);
        assert_eq!(config.backend_base_url(), None);
    }

    #[test]
    fn base_url_wins_over_port() {
        let mut config = ShellConfig::default();
        config.backend.port = Some(9000);
        assert_eq!(
            config.backend_base_url().as_deref(),
            Some("http://127.0.0.1:9000")
        );

        config.backend.base_url = Some("http://localhost:1234".to_string());
        assert_eq!(
            config.backend_base_url().as_deref(),
            Some("http://localhost:1234")
        );
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[chat]\nsearch_mode = \"auto\"\n\n[backend]\nport = 8765\n",
        )
        .unwrap();

        let config = ShellConfig::load_from(&path).unwrap();
        assert_eq!(config.chat.search_mode, SearchMode::Auto);
        assert_eq!(config.backend.port, Some(8765));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend = 5").unwrap();

        let err = ShellConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ShellError::Config(_)));
    }
}
