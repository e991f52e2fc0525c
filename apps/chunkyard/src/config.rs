//! Server configuration.
//!
//! Stored as TOML at `$CHUNKYARD_CONFIG`, otherwise:
//! - Linux: `~/.config/chunkyard/server.toml`
//! - Windows: `%APPDATA%/chunkyard/server.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable overriding the configuration file location.
const CONFIG_ENV: &str = "CHUNKYARD_CONFIG";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Accept chunked uploads. When off every request is a whole file.
    #[serde(default = "default_true")]
    pub partial_uploads: bool,

    /// Folder holding partially assembled uploads.
    #[serde(default = "default_chunk_dir")]
    pub chunk_dir: PathBuf,

    /// Folder receiving finished uploads.
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    /// Public URL prefix of `media_root`.
    #[serde(default = "default_media_url")]
    pub media_url: String,

    /// Seconds an idle upload's state is kept (0 = forever).
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_true() -> bool {
    true
}

fn default_chunk_dir() -> PathBuf {
    std::env::temp_dir().join("chunkyard-chunks")
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_media_url() -> String {
    "/media/".into()
}

fn default_state_ttl_secs() -> u64 {
    300
}

fn default_max_chunk_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            partial_uploads: default_true(),
            chunk_dir: default_chunk_dir(),
            media_root: default_media_root(),
            media_url: default_media_url(),
            state_ttl_secs: default_state_ttl_secs(),
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration read");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    platform_config_path()
}

fn platform_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("chunkyard").join("server.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("chunkyard")
            .join("server.toml")
    }
}
