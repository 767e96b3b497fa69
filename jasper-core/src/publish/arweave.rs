//! Arweave uploads through `arkb deploy`

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    excerpt, failure_message, simulated_transaction_id, timestamp, token_preview, tool_failed,
    AtStage, BatchReport, FileOutcome, PublishStage, Receipt, StageError,
};
use crate::config::ArweaveSettings;
use crate::credentials::find_wallet;
use crate::error::{file_name, PublishError};
use crate::index::{record_upload, ArchiveHash, ArchiveRecord, IndexStore};
use crate::note::NoteMetadata;
use crate::notify::Notifier;
use crate::probe::{CostProbe, QueueEstimate, SpendBlocked};
use crate::runner::{ToolError, ToolRunner};

static TX_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://arweave\.net/([A-Za-z0-9_-]{43})(?:[^A-Za-z0-9_-]|$)")
        .expect("valid arweave url regex")
});

/// Length of an Arweave transaction id (base64url of 32 bytes)
const TX_ID_LEN: usize = 43;

/// Extract the transaction id from `arkb deploy` output.
///
/// The `https://arweave.net/<id>` URL wins; otherwise the last standalone
/// 43-character base64url token is taken.
pub fn parse_transaction_id(stdout: &str) -> Option<String> {
    if let Some(caps) = TX_URL_PATTERN.captures(stdout) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    stdout
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .filter(|token| token.len() == TX_ID_LEN)
        .last()
        .map(str::to_string)
}

/// Arguments for `arkb deploy`, in a fixed order
pub fn deploy_args(
    file: &Path,
    wallet: &Path,
    app_name: &str,
    uuid: &str,
    note_type: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "deploy".to_string(),
        file.to_string_lossy().into_owned(),
        "--wallet".to_string(),
        wallet.to_string_lossy().into_owned(),
    ];
    let mut tags = vec![
        "Content-Type:text/markdown".to_string(),
        format!("App-Name:{app_name}"),
        format!("UUID:{uuid}"),
    ];
    if let Some(note_type) = note_type {
        tags.push(format!("Type:{note_type}"));
    }
    for tag in tags {
        args.push("--tag".to_string());
        args.push(tag);
    }
    args.push("--no-bundle".to_string());
    args.push("--auto-confirm".to_string());
    args
}

pub struct ArweavePublisher {
    settings: ArweaveSettings,
    runner: Arc<dyn ToolRunner>,
    notifier: Arc<dyn Notifier>,
    store: IndexStore<ArchiveRecord>,
}

impl ArweavePublisher {
    pub fn new(
        settings: ArweaveSettings,
        runner: Arc<dyn ToolRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = IndexStore::new(settings.index_file.clone());
        Self {
            settings,
            runner,
            notifier,
            store,
        }
    }

    pub fn store(&self) -> &IndexStore<ArchiveRecord> {
        &self.store
    }

    /// Upload every file in order, recording each success in the archive.
    ///
    /// Outside simulation mode the queue is priced first and the batch is
    /// refused when the balance is unknown or below the total cost.
    pub async fn upload_batch(&self, files: &[PathBuf]) -> BatchReport {
        if files.is_empty() {
            info!("No files provided for Arweave upload.");
            return BatchReport::default();
        }

        let gate = if self.settings.simulate {
            Ok(())
        } else {
            let probe = CostProbe::new(self.settings.clone(), self.runner.clone());
            probe.estimate_queue(files).await.spend_gate(false)
        };
        self.run_batch(files, gate).await
    }

    /// Upload the notes of an estimate the caller already holds
    pub async fn upload_queue(&self, estimate: &QueueEstimate) -> BatchReport {
        let files: Vec<PathBuf> = estimate.items.iter().map(|i| i.path.clone()).collect();
        if files.is_empty() {
            info!("No files provided for Arweave upload.");
            return BatchReport::default();
        }
        let gate = estimate.spend_gate(self.settings.simulate);
        self.run_batch(&files, gate).await
    }

    async fn run_batch(&self, files: &[PathBuf], gate: Result<(), SpendBlocked>) -> BatchReport {
        let wallet = find_wallet(&self.settings.wallet_env, &self.settings.wallet_candidates);
        if wallet.is_none() && !self.settings.simulate {
            let error = PublishError::MissingWallet;
            error.log();
            self.notifier.notify(&error.to_string());
            return BatchReport::aborted(files, error);
        }

        if let Err(blocked) = gate {
            let error = PublishError::from(blocked);
            error.log();
            self.notifier.notify(&error.to_string());
            return BatchReport::aborted(files, error);
        }

        if self.settings.simulate {
            info!("Simulation mode: Arweave deploys will not be executed");
        }
        info!("Starting Arweave upload process for {} files.", files.len());
        self.notifier
            .notify(&format!("Starting Arweave upload for {} files...", files.len()));

        let mut records = self.store.load();
        let mut report = BatchReport::default();

        for (i, file) in files.iter().enumerate() {
            info!("Processing for Arweave upload: {}", file_name(file));
            match self.upload_file(file, wallet.as_deref(), &mut records).await {
                Ok(receipt) => {
                    self.notifier.notify(&format!(
                        "Uploaded {}: {}...",
                        file_name(file),
                        token_preview(&receipt.token)
                    ));
                    report.push(file, FileOutcome::Published(receipt));
                }
                Err(StageError { stage, error }) => {
                    error.log();
                    debug!("{} failed after stage {:?}", file_name(file), stage);
                    if error.aborts_batch() {
                        self.notifier.notify(&error.to_string());
                        report.push(file, FileOutcome::NotAttempted);
                        report.skip_remaining(&files[i + 1..]);
                        report.abort = Some(error);
                        break;
                    }
                    self.notifier
                        .notify(&failure_message("upload", file, &error));
                    report.push(file, FileOutcome::Failed { stage, error });
                }
            }
        }

        let summary = format!(
            "Arweave upload finished: {} succeeded, {} failed.",
            report.succeeded(),
            report.failed()
        );
        info!("{}", summary);
        self.notifier.notify(&summary);
        report
    }

    async fn upload_file(
        &self,
        file: &Path,
        wallet: Option<&Path>,
        records: &mut Vec<ArchiveRecord>,
    ) -> Result<Receipt, StageError> {
        let metadata = NoteMetadata::load(file)
            .map_err(|source| PublishError::NoteUnreadable {
                file: file.to_path_buf(),
                source,
            })
            .at(PublishStage::Idle)?;
        let uuid = metadata
            .identifier()
            .ok_or_else(|| PublishError::MissingIdentifier {
                file: file.to_path_buf(),
            })
            .at(PublishStage::Idle)?
            .to_string();

        let tx_id = if self.settings.simulate {
            self.simulate_deploy(file).await
        } else {
            let wallet = wallet
                .ok_or(PublishError::MissingWallet)
                .at(PublishStage::PreflightChecked)?;
            self.deploy(file, wallet, &uuid, metadata.note_type.as_deref())
                .await?
        };

        debug!("{} reached {:?}", file_name(file), PublishStage::Parsed);
        let entry = ArchiveHash::new(&tx_id, timestamp());
        let locator = entry.link.clone();
        record_upload(records, &uuid, &metadata.title, entry);

        let recorded = match self.store.save(records) {
            Ok(()) => true,
            Err(e) => {
                error!("Index save failed after uploading {}: {}", file_name(file), e);
                self.notifier.notify(&format!(
                    "Critical: Failed to save updated Arweave index after uploading {}!",
                    file_name(file)
                ));
                false
            }
        };
        debug!("{} reached {:?}", file_name(file), PublishStage::Recorded);

        Ok(Receipt {
            token: tx_id,
            locator,
            recorded,
        })
    }

    async fn simulate_deploy(&self, file: &Path) -> String {
        tokio::time::sleep(self.settings.simulate_delay()).await;
        let tx_id = simulated_transaction_id();
        info!("Simulated upload of {}, TX ID: {}", file_name(file), tx_id);
        tx_id
    }

    async fn deploy(
        &self,
        file: &Path,
        wallet: &Path,
        uuid: &str,
        note_type: Option<&str>,
    ) -> Result<String, StageError> {
        let tool = &self.settings.tool;
        let args = deploy_args(file, wallet, &self.settings.app_name, uuid, note_type);

        let output = self
            .runner
            .run(tool, &args)
            .await
            .map_err(|e| match e {
                ToolError::NotFound { program } => PublishError::ToolUnavailable { program },
                ToolError::Spawn { program, source } => PublishError::ToolFailed {
                    program,
                    code: None,
                    stderr: source.to_string(),
                },
            })
            .at(PublishStage::PreflightChecked)?;

        debug!("{} deploy stdout for {}:\n{}", tool, file_name(file), output.stdout);
        if !output.success() {
            if output.stderr.to_lowercase().contains("insufficient funds") {
                error!("Reason likely insufficient funds.");
            }
            return Err(tool_failed(tool, &output)).at(PublishStage::Invoked);
        }
        if !output.stderr.trim().is_empty() {
            warn!("{} deploy stderr for {}:\n{}", tool, file_name(file), output.stderr);
        }

        let tx_id = parse_transaction_id(&output.stdout)
            .ok_or_else(|| PublishError::ResultUnparseable {
                program: tool.clone(),
                excerpt: excerpt(&output.stdout),
            })
            .at(PublishStage::Invoked)?;

        info!("Successfully deployed {}, TX ID: {}", file_name(file), tx_id);
        Ok(tx_id)
    }
}
