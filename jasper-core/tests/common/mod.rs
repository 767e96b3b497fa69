//! Test helpers shared by the integration tests
//!
//! Provides a scripted [`ToolRunner`] standing in for `arkb` / `bsky`, a
//! notifier that records every message, and note/settings fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use jasper_core::config::{ArweaveSettings, AtprotoSettings};
use jasper_core::runner::{ToolError, ToolOutput, ToolRunner};
use jasper_core::Notifier;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Canned response for one tool invocation
pub enum Scripted {
    Output(ToolOutput),
    Missing,
}

pub fn ok(stdout: &str) -> Scripted {
    Scripted::Output(ToolOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub fn fail(code: i32, stderr: &str) -> Scripted {
    Scripted::Output(ToolOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

/// `arkb balance` reply for a wallet that can cover any test queue
pub fn funded() -> Scripted {
    ok("Wallet balance:\nAR 1.000000\n")
}

/// Replays queued responses in order and records every call.
///
/// With an empty queue every call behaves as if the executable is missing.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new(responses: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A runner for a machine without the tool installed
    pub fn missing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// First argument of every call ("deploy", "post", "--version", ...)
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(_, args)| args.first().cloned().unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Missing) | None => Err(ToolError::NotFound {
                program: program.to_string(),
            }),
        }
    }
}

/// Notifier that keeps every message for later assertions
#[derive(Clone, Default)]
pub struct Messages(Arc<Mutex<Vec<String>>>);

impl Messages {
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        let sink = self.0.clone();
        Arc::new(move |message: &str| sink.lock().unwrap().push(message.to_string()))
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.all().iter().filter(|m| m.contains(needle)).count()
    }
}

/// Write a markdown note with optional uuid and type frontmatter
pub fn write_note(dir: &Path, name: &str, uuid: Option<&str>, title: &str) -> PathBuf {
    let mut frontmatter = format!("title: {title}\n");
    if let Some(uuid) = uuid {
        frontmatter.push_str(&format!("uuid: {uuid}\n"));
    }
    let path = dir.join(name);
    fs::write(&path, format!("---\n{frontmatter}---\n\n# {title}\n\nBody text.\n")).unwrap();
    path
}

/// Arweave settings rooted in a temp dir: no delay, wallet only if created
pub fn arweave_settings(dir: &Path) -> ArweaveSettings {
    ArweaveSettings {
        index_file: dir.join("data").join("archive.json"),
        wallet_env: "JASPER_TEST_UNSET_WALLET".to_string(),
        wallet_candidates: vec![dir.join(".wallet.json")],
        simulate_delay_ms: 0,
        ..ArweaveSettings::default()
    }
}

/// Create the wallet file `arweave_settings` looks for
pub fn create_wallet(dir: &Path) -> PathBuf {
    let wallet = dir.join(".wallet.json");
    fs::write(&wallet, r#"{"kty": "RSA"}"#).unwrap();
    wallet
}

pub fn atproto_settings(dir: &Path) -> AtprotoSettings {
    AtprotoSettings {
        index_file: dir.join("data").join("atproto_posts.json"),
        credentials_file: dir.join("data").join("atproto_credentials.json"),
        simulate_delay_ms: 0,
        ..AtprotoSettings::default()
    }
}

/// A 43-character transaction id built from a short seed
pub fn tx_id(seed: &str) -> String {
    format!("{seed:_<43}")
}
