//! Cost and connectivity probes
//!
//! Every probe is read-only and never fails: problems degrade to a neutral
//! value (`0.0` balance, `0.0` cost, a not-ready [`Connectivity`]) plus a log line
//! naming the exact cause. A balance of `0.0` means "unknown", so spend is
//! refused unless simulation mode is active.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ArweaveSettings;
use crate::credentials::find_wallet;
use crate::note::NoteMetadata;
use crate::runner::{args, ToolError, ToolRunner};

static BALANCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"AR\s+(\d+(?:\.\d+)?)").expect("valid balance regex"));

/// Extract the AR amount from `arkb balance` output
pub fn parse_balance(output: &str) -> Option<f64> {
    BALANCE_PATTERN
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Size-based cost heuristic: `bytes / 1024 * cost_per_kib`.
///
/// `arkb` price queries proved unreliable, so the estimate never touches the
/// network.
pub fn heuristic_cost(size_bytes: u64, cost_per_kib: f64) -> f64 {
    (size_bytes as f64 / 1024.0) * cost_per_kib
}

/// Arweave balance and cost probe
pub struct CostProbe {
    settings: ArweaveSettings,
    runner: Arc<dyn ToolRunner>,
}

impl CostProbe {
    pub fn new(settings: ArweaveSettings, runner: Arc<dyn ToolRunner>) -> Self {
        Self { settings, runner }
    }

    /// Wallet balance in AR; `0.0` when it cannot be determined
    pub async fn balance(&self) -> f64 {
        let Some(wallet) = find_wallet(&self.settings.wallet_env, &self.settings.wallet_candidates)
        else {
            error!("Cannot get balance: Arweave wallet path not found.");
            return 0.0;
        };
        self.balance_for(&wallet).await
    }

    pub async fn balance_for(&self, wallet: &Path) -> f64 {
        let tool = &self.settings.tool;
        let wallet_arg = wallet.to_string_lossy().into_owned();
        let output = match self
            .runner
            .run(tool, &args(["balance", "--wallet", wallet_arg.as_str()]))
            .await
        {
            Ok(output) => output,
            Err(ToolError::NotFound { .. }) => {
                error!(
                    "'{}' command not found. Please ensure Arweave Wallet Kit is installed and in PATH.",
                    tool
                );
                return 0.0;
            }
            Err(e) => {
                error!("Error checking wallet balance: {}", e);
                return 0.0;
            }
        };

        if !output.success() {
            error!(
                "'{} balance' failed (code {:?}): {}",
                tool,
                output.code,
                output.stderr.trim()
            );
            return 0.0;
        }

        match parse_balance(&output.stdout) {
            Some(balance) => {
                info!("Wallet balance: {:.6} AR", balance);
                balance
            }
            None => {
                error!(
                    "Could not parse balance from '{} balance' output: {}",
                    tool,
                    output.stdout.trim()
                );
                0.0
            }
        }
    }

    /// Estimated upload cost of one note in AR; `0.0` if the file is unreadable
    pub fn estimate_cost(&self, file: &Path) -> f64 {
        match std::fs::metadata(file) {
            Ok(meta) => {
                let cost = heuristic_cost(meta.len(), self.settings.cost_per_kib);
                debug!(
                    "Estimated cost for {}: {:.6} AR (size-based heuristic)",
                    file.display(),
                    cost
                );
                cost
            }
            Err(e) => {
                error!("Cannot estimate cost for {}: {}", file.display(), e);
                0.0
            }
        }
    }

    /// Price every queued note and fetch the balance once
    pub async fn estimate_queue(&self, files: &[PathBuf]) -> QueueEstimate {
        let balance = self.balance().await;
        let items: Vec<QueuedItem> = files
            .iter()
            .map(|file| QueuedItem {
                path: file.clone(),
                cost: self.estimate_cost(file),
                metadata: NoteMetadata::load_or_default(file),
            })
            .collect();
        let total_cost = items.iter().map(|i| i.cost).sum();

        debug!(
            "Queue estimate: {} files, total cost {:.6} AR, balance {:.6} AR",
            items.len(),
            total_cost,
            balance
        );
        QueueEstimate {
            items,
            total_cost,
            balance,
        }
    }
}

/// A queued note annotated for the confirmation screen
#[derive(Debug, Clone)]
pub struct QueuedItem {
    pub path: PathBuf,
    pub cost: f64,
    pub metadata: NoteMetadata,
}

/// Why an upload batch may not spend funds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpendBlocked {
    #[error("Wallet balance unavailable; refusing to spend.")]
    BalanceUnavailable,

    #[error("Insufficient wallet balance for Arweave upload ({balance:.6} AR < {cost:.6} AR).")]
    InsufficientFunds { balance: f64, cost: f64 },
}

/// Costs and balance for the current queue
#[derive(Debug, Clone)]
pub struct QueueEstimate {
    pub items: Vec<QueuedItem>,
    pub total_cost: f64,
    /// `0.0` means the balance is unknown
    pub balance: f64,
}

impl QueueEstimate {
    pub fn balance_known(&self) -> bool {
        self.balance > 0.0
    }

    /// Gate for spend actions; simulation mode always passes
    pub fn spend_gate(&self, simulate: bool) -> Result<(), SpendBlocked> {
        if simulate {
            return Ok(());
        }
        if !self.balance_known() {
            warn!("Spend gate closed: balance unknown");
            return Err(SpendBlocked::BalanceUnavailable);
        }
        if self.balance < self.total_cost {
            return Err(SpendBlocked::InsufficientFunds {
                balance: self.balance,
                cost: self.total_cost,
            });
        }
        Ok(())
    }
}

/// Last queue estimate, valid for one selection generation
#[derive(Debug, Default)]
pub struct ProbeCache {
    entry: Option<(u64, QueueEstimate)>,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached estimate if it was computed for `generation`
    pub fn get(&self, generation: u64) -> Option<&QueueEstimate> {
        match &self.entry {
            Some((cached, estimate)) if *cached == generation => Some(estimate),
            _ => None,
        }
    }

    pub fn store(&mut self, generation: u64, estimate: QueueEstimate) {
        self.entry = Some((generation, estimate));
    }

    /// Drop the cached estimate (selection changed or a publish completed)
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Cached estimate for `generation`, recomputing it when stale
    pub async fn get_or_estimate(
        &mut self,
        probe: &CostProbe,
        generation: u64,
        files: &[PathBuf],
    ) -> &QueueEstimate {
        match self.entry.take() {
            Some((cached, estimate)) if cached == generation => {
                &self.entry.insert((cached, estimate)).1
            }
            _ => {
                debug!("Probe cache stale for generation {}", generation);
                let estimate = probe.estimate_queue(files).await;
                &self.entry.insert((generation, estimate)).1
            }
        }
    }
}

/// Whether the Bluesky CLI is installed and logged in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    Ready { version: String },
    ToolMissing,
    ToolBroken,
    NotAuthenticated,
}

/// `bsky --version`: installed check
pub async fn bsky_installed(runner: &dyn ToolRunner, tool: &str) -> Result<String, Connectivity> {
    match runner.run(tool, &args(["--version"])).await {
        Ok(output) if output.success() => Ok(output.stdout.trim().to_string()),
        Ok(output) => {
            warn!("{} --version returned an error: {}", tool, output.stderr.trim());
            Err(Connectivity::ToolBroken)
        }
        Err(ToolError::NotFound { .. }) => {
            error!(
                "{} CLI not found. Install with 'npm install -g @atproto/cli' then run '{} login'",
                tool, tool
            );
            Err(Connectivity::ToolMissing)
        }
        Err(e) => {
            error!("Error checking {} CLI: {}", tool, e);
            Err(Connectivity::ToolBroken)
        }
    }
}

/// Installed check followed by `bsky show-session`
pub async fn bsky_connectivity(runner: &dyn ToolRunner, tool: &str) -> Connectivity {
    let version = match bsky_installed(runner, tool).await {
        Ok(version) => version,
        Err(state) => return state,
    };

    match runner.run(tool, &args(["show-session"])).await {
        Ok(output) if output.success() => {
            debug!("{} show-session: {}", tool, output.stdout.trim());
            Connectivity::Ready { version }
        }
        Ok(_) => Connectivity::NotAuthenticated,
        Err(ToolError::NotFound { .. }) => Connectivity::ToolMissing,
        Err(e) => {
            error!("Error checking {} session: {}", tool, e);
            Connectivity::ToolBroken
        }
    }
}
