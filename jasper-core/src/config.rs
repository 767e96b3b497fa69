//! Jasper configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. CLI flags (`--simulate`, `--content-root`)
//! 2. `jasper.json` in the working directory, or the file passed with `--config`
//! 3. Built-in defaults
//!
//! ```json
//! {
//!   "content_root": "content",
//!   "arweave": {"index_file": "data/archive.json", "simulate": false},
//!   "atproto": {"credentials_file": "data/atproto_credentials.json"}
//! }
//! ```
//!
//! Simulation mode lives here, per network, and is threaded into the
//! publishers at construction time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default config file looked up in the working directory
pub const CONFIG_FILE: &str = "jasper.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JasperConfig {
    /// Directory browsed for markdown notes
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    #[serde(default)]
    pub arweave: ArweaveSettings,

    #[serde(default)]
    pub atproto: AtprotoSettings,
}

impl Default for JasperConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            arweave: ArweaveSettings::default(),
            atproto: AtprotoSettings::default(),
        }
    }
}

impl JasperConfig {
    /// Load from an explicit path, or `jasper.json` if present, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load_from_path(Path::new(CONFIG_FILE)),
            None => {
                debug!("No {} found, using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Arweave (content-addressed network) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArweaveSettings {
    #[serde(default = "default_archive_index")]
    pub index_file: PathBuf,

    /// Executable used for balance and deploy
    #[serde(default = "default_arkb")]
    pub tool: String,

    /// Environment variable naming the wallet file
    #[serde(default = "default_wallet_env")]
    pub wallet_env: String,

    /// Fallback wallet locations, first existing wins
    #[serde(default = "default_wallet_candidates")]
    pub wallet_candidates: Vec<PathBuf>,

    /// Value of the App-Name tag on every upload
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Estimated AR per KiB of note content
    #[serde(default = "default_cost_per_kib")]
    pub cost_per_kib: f64,

    /// Skip the real deploy and synthesize a transaction id
    #[serde(default)]
    pub simulate: bool,

    #[serde(default = "default_arweave_delay")]
    pub simulate_delay_ms: u64,
}

impl Default for ArweaveSettings {
    fn default() -> Self {
        Self {
            index_file: default_archive_index(),
            tool: default_arkb(),
            wallet_env: default_wallet_env(),
            wallet_candidates: default_wallet_candidates(),
            app_name: default_app_name(),
            cost_per_kib: default_cost_per_kib(),
            simulate: false,
            simulate_delay_ms: default_arweave_delay(),
        }
    }
}

impl ArweaveSettings {
    pub fn simulate_delay(&self) -> Duration {
        Duration::from_millis(self.simulate_delay_ms)
    }
}

/// AT Protocol (Bluesky) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtprotoSettings {
    #[serde(default = "default_posts_index")]
    pub index_file: PathBuf,

    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Executable used for session checks and posting
    #[serde(default = "default_bsky")]
    pub tool: String,

    /// Skip the real post and synthesize a post url
    #[serde(default)]
    pub simulate: bool,

    #[serde(default = "default_atproto_delay")]
    pub simulate_delay_ms: u64,

    /// Handle used in simulated post urls
    #[serde(default = "default_simulated_handle")]
    pub simulated_handle: String,
}

impl Default for AtprotoSettings {
    fn default() -> Self {
        Self {
            index_file: default_posts_index(),
            credentials_file: default_credentials_file(),
            tool: default_bsky(),
            simulate: false,
            simulate_delay_ms: default_atproto_delay(),
            simulated_handle: default_simulated_handle(),
        }
    }
}

impl AtprotoSettings {
    pub fn simulate_delay(&self) -> Duration {
        Duration::from_millis(self.simulate_delay_ms)
    }
}

fn default_content_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_archive_index() -> PathBuf {
    PathBuf::from("data/archive.json")
}

fn default_posts_index() -> PathBuf {
    PathBuf::from("data/atproto_posts.json")
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("data/atproto_credentials.json")
}

fn default_arkb() -> String {
    "arkb".to_string()
}

fn default_bsky() -> String {
    "bsky".to_string()
}

fn default_wallet_env() -> String {
    "ARWEAVE_WALLET_PATH".to_string()
}

fn default_wallet_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(".wallet.json")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config").join("arkb").join("wallet.json"));
    }
    candidates
}

fn default_app_name() -> String {
    "Quartz-Notes".to_string()
}

fn default_cost_per_kib() -> f64 {
    0.000001
}

fn default_arweave_delay() -> u64 {
    500
}

fn default_atproto_delay() -> u64 {
    1000
}

fn default_simulated_handle() -> String {
    "test.bsky.social".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = JasperConfig::default();
        assert_eq!(config.arweave.index_file, PathBuf::from("data/archive.json"));
        assert_eq!(config.atproto.index_file, PathBuf::from("data/atproto_posts.json"));
        assert_eq!(config.arweave.tool, "arkb");
        assert!(!config.arweave.simulate);
        assert!(!config.atproto.simulate);
        assert_eq!(config.arweave.wallet_candidates[0], PathBuf::from(".wallet.json"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jasper.json");
        std::fs::write(
            &path,
            r#"{"content_root": "notes", "arweave": {"simulate": true, "simulate_delay_ms": 0}}"#,
        )
        .unwrap();

        let config = JasperConfig::load(Some(&path)).unwrap();
        assert_eq!(config.content_root, PathBuf::from("notes"));
        assert!(config.arweave.simulate);
        assert_eq!(config.arweave.simulate_delay(), Duration::ZERO);
        assert_eq!(config.arweave.app_name, "Quartz-Notes");
        assert_eq!(config.atproto.tool, "bsky");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jasper.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(JasperConfig::load_from_path(&path).is_err());
    }
}
