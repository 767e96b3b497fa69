//! Wallet and Bluesky credential discovery
//!
//! Environment always wins over files: `ARWEAVE_WALLET_PATH` over the default
//! wallet locations, `BSKY_USER`/`BSKY_PASSWORD` over the credentials file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const BSKY_USER_ENV: &str = "BSKY_USER";
pub const BSKY_PASSWORD_ENV: &str = "BSKY_PASSWORD";

/// Resolve the Arweave wallet file.
///
/// The path named by `env_var` is used when it exists; otherwise the first
/// existing candidate wins.
pub fn find_wallet(env_var: &str, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Ok(from_env) = std::env::var(env_var) {
        let path = PathBuf::from(&from_env);
        if !from_env.is_empty() && path.exists() {
            info!("Using wallet from {}: {}", env_var, path.display());
            return Some(path);
        }
        warn!("{} is set but {} does not exist", env_var, path.display());
    }

    for candidate in candidates {
        if candidate.exists() {
            info!("Found wallet at: {}", candidate.display());
            return Some(candidate.clone());
        }
        debug!("Tried wallet path (not found): {}", candidate.display());
    }

    warn!("No Arweave wallet file found in environment variable or default locations.");
    None
}

/// Bluesky login, as stored in `data/atproto_credentials.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtprotoCredentials {
    pub handle: String,
    pub email: String,
    pub password: String,
}

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("BSKY_USER and BSKY_PASSWORD environment variables not set")]
    EnvNotSet,

    #[error("Failed to write credentials to {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize credentials")]
    Serialize(#[from] serde_json::Error),
}

impl AtprotoCredentials {
    /// Credentials from the environment, then from `file`; `None` if neither is usable
    pub fn load(file: &Path) -> Option<Self> {
        if let Some(creds) = Self::from_env() {
            info!(
                "Using AT Protocol credentials from environment variables for {}",
                creds.handle
            );
            return Some(creds);
        }

        if !file.exists() {
            warn!(
                "Credentials file not found at {} and no environment variables set",
                file.display()
            );
            return None;
        }

        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                error!("Error loading credentials from {}: {}", file.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!(
                    "Credentials file {} missing required fields (handle, email, password): {}",
                    file.display(),
                    e
                );
                None
            }
        }
    }

    /// Handle doubles as the email; Bluesky accepts either
    pub fn from_env() -> Option<Self> {
        let user = std::env::var(BSKY_USER_ENV).ok().filter(|v| !v.is_empty())?;
        let password = std::env::var(BSKY_PASSWORD_ENV)
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self {
            handle: user.clone(),
            email: user,
            password,
        })
    }

    pub fn save(&self, file: &Path) -> Result<(), CredentialsError> {
        let write_err = |source: std::io::Error| CredentialsError::Write {
            path: file.to_path_buf(),
            source,
        };
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(file, content).map_err(write_err)?;
        info!("Saved AT Protocol credentials for {}", self.handle);
        Ok(())
    }

    /// Persist the environment credentials to `file`
    pub fn save_env_to_file(file: &Path) -> Result<Self, CredentialsError> {
        let creds = Self::from_env().ok_or(CredentialsError::EnvNotSet)?;
        creds.save(file)?;
        Ok(creds)
    }
}
