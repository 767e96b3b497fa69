//! Bluesky credential commands

use anyhow::{Context, Result};
use clap::Parser;

use jasper_core::credentials::AtprotoCredentials;
use jasper_core::JasperConfig;

#[derive(Parser, Debug)]
pub enum CredentialsCommand {
    /// Save BSKY_USER / BSKY_PASSWORD to the credentials file
    SaveEnv,

    /// Show which Bluesky account would be used
    Show,
}

impl CredentialsCommand {
    pub fn execute(&self, config: &JasperConfig) -> Result<()> {
        let file = &config.atproto.credentials_file;
        match self {
            CredentialsCommand::SaveEnv => {
                let creds = AtprotoCredentials::save_env_to_file(file).with_context(|| {
                    format!("Failed to save credentials to {}", file.display())
                })?;
                println!(
                    "Saved credentials for {} to {}",
                    creds.handle,
                    file.display()
                );
            }
            CredentialsCommand::Show => match AtprotoCredentials::load(file) {
                Some(creds) => println!("Bluesky handle: {}", creds.handle),
                None => println!(
                    "No Bluesky credentials found (set BSKY_USER and BSKY_PASSWORD or run 'jasper credentials save-env')"
                ),
            },
        }
        Ok(())
    }
}
