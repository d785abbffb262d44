//! Application configuration for linkshelf.
//!
//! User config lives at `~/.linkshelf/linkshelf.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkshelfError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "linkshelf.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".linkshelf";

/// Database file name inside the data directory.
const DATABASE_FILE_NAME: &str = "linkshelf.db";

/// Thumbnail directory name inside the data directory.
const THUMBNAIL_DIR_NAME: &str = "thumb";

// ---------------------------------------------------------------------------
// Config structs (matching linkshelf.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the database and thumbnails live.
    #[serde(default)]
    pub storage: StorageSection,

    /// HTTP fetch settings.
    #[serde(default)]
    pub fetch: FetchSection,

    /// URL normalization settings.
    #[serde(default)]
    pub normalize: NormalizeSection,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Data directory; a leading `~` expands to the home directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    format!("~/{CONFIG_DIR_NAME}")
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Page fetch timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest page body accepted, in bytes.
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: u64,

    /// Redirects followed before giving up.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_page_bytes: default_max_page_bytes(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_page_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_max_redirects() -> usize {
    5
}
fn default_user_agent() -> String {
    concat!("linkshelf/", env!("CARGO_PKG_VERSION")).into()
}

/// `[normalize]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeSection {
    /// Query parameter names stripped from bookmarked URLs.
    #[serde(default = "default_tracking_params")]
    pub tracking_params: Vec<String>,
}

impl Default for NormalizeSection {
    fn default() -> Self {
        Self {
            tracking_params: default_tracking_params(),
        }
    }
}

fn default_tracking_params() -> Vec<String> {
    [
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl AppConfig {
    /// Resolve the data directory, expanding a leading `~`.
    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_home(&self.storage.data_dir)
    }

    /// Path to the bookmark database.
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(DATABASE_FILE_NAME))
    }

    /// Directory holding per-bookmark thumbnail files.
    pub fn thumbnail_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(THUMBNAIL_DIR_NAME))
    }
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, derived from config file)
// ---------------------------------------------------------------------------

/// Runtime HTTP configuration handed to the web client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for a single page fetch.
    pub timeout: Duration,
    /// Largest page body accepted, in bytes.
    pub max_page_bytes: u64,
    /// Redirect limit.
    pub max_redirects: usize,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            max_page_bytes: config.fetch.max_page_bytes,
            max_redirects: config.fetch.max_redirects,
            user_agent: config.fetch.user_agent.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.linkshelf/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LinkshelfError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.linkshelf/linkshelf.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LinkshelfError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LinkshelfError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LinkshelfError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LinkshelfError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LinkshelfError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| LinkshelfError::config("could not determine home directory"))?;
            Ok(home.join(rest.trim_start_matches(['/', '\\'])))
        }
        None => Ok(PathBuf::from(raw)),
    }
}
