//! Bluesky posts through `bsky post`

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{
    excerpt, failure_message, timestamp, tool_failed, AtStage, BatchReport, FileOutcome,
    PublishStage, Receipt, StageError,
};
use crate::config::AtprotoSettings;
use crate::credentials::AtprotoCredentials;
use crate::error::{file_name, PublishError};
use crate::index::{record_post, IndexStore, PostRecord};
use crate::note::NoteMetadata;
use crate::notify::Notifier;
use crate::probe::{bsky_connectivity, Connectivity};
use crate::runner::{args, ToolError, ToolRunner};

static POST_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://bsky\.app/profile/[A-Za-z0-9:._-]*[A-Za-z0-9_-]/post/[A-Za-z0-9._:~-]*[A-Za-z0-9_~-]")
        .expect("valid post url regex")
});

/// `at://<did>` with an optional `/<collection>/<rkey>` tail
static AT_URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"at://([A-Za-z0-9:._-]*[A-Za-z0-9_-])(?:/([A-Za-z0-9.-]*[A-Za-z0-9])/([A-Za-z0-9._:~-]*[A-Za-z0-9_~-]))?",
    )
    .expect("valid at uri regex")
});

/// Record collection of a Bluesky post
const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Extract the post location from `bsky post` output.
///
/// A `bsky.app` web URL wins. An `at://<did>/app.bsky.feed.post/<rkey>` URI
/// is converted to its web URL; any other AT URI is returned as-is. Trailing
/// punctuation and quoting around either form is not part of the locator.
pub fn parse_post_locator(stdout: &str) -> Option<String> {
    if let Some(m) = POST_URL_PATTERN.find(stdout) {
        return Some(m.as_str().to_string());
    }

    let caps = AT_URI_PATTERN.captures(stdout)?;
    match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(did), Some(collection), Some(rkey)) if collection.as_str() == POST_COLLECTION => {
            Some(format!(
                "https://bsky.app/profile/{}/post/{}",
                did.as_str(),
                rkey.as_str()
            ))
        }
        _ => caps.get(0).map(|m| m.as_str().to_string()),
    }
}

/// Session probe result, checked at most once per batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Session {
    Unchecked,
    Ready,
}

pub struct AtprotoPublisher {
    settings: AtprotoSettings,
    runner: Arc<dyn ToolRunner>,
    notifier: Arc<dyn Notifier>,
    store: IndexStore<PostRecord>,
}

impl AtprotoPublisher {
    pub fn new(
        settings: AtprotoSettings,
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

    pub fn store(&self) -> &IndexStore<PostRecord> {
        &self.store
    }

    /// Post `text` once for every file, recording each success in the posts index
    pub async fn post_batch(&self, files: &[PathBuf], text: &str) -> BatchReport {
        if files.is_empty() {
            info!("No files provided for AT Protocol posting.");
            return BatchReport::default();
        }

        if !self.settings.simulate {
            if let Some(creds) = AtprotoCredentials::load(&self.settings.credentials_file) {
                debug!("Posting as {}", creds.handle);
            } else {
                let error = PublishError::MissingCredentials;
                error.log();
                self.notifier.notify(&error.to_string());
                return BatchReport::aborted(files, error);
            }
        } else {
            info!("Simulation mode: bsky posts will not be executed");
        }

        info!("Starting AT Protocol posting process for {} files.", files.len());
        self.notifier
            .notify(&format!("Starting AT Protocol posting for {} files...", files.len()));

        let mut records = self.store.load();
        let mut report = BatchReport::default();
        let mut session = Session::Unchecked;

        for (i, file) in files.iter().enumerate() {
            info!("Processing for AT Protocol posting: {}", file_name(file));
            match self.post_file(file, text, &mut session, &mut records).await {
                Ok(receipt) => {
                    self.notifier.notify(&format!(
                        "Posted {} to Bluesky: {}",
                        file_name(file),
                        receipt.locator
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
                    self.notifier.notify(&failure_message("post", file, &error));
                    report.push(file, FileOutcome::Failed { stage, error });
                }
            }
        }

        let summary = format!(
            "AT Protocol posting process completed: {} succeeded, {} failed.",
            report.succeeded(),
            report.failed()
        );
        info!("{}", summary);
        self.notifier.notify(&summary);
        report
    }

    async fn post_file(
        &self,
        file: &Path,
        text: &str,
        session: &mut Session,
        records: &mut Vec<PostRecord>,
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
        if text.trim().is_empty() {
            return Err(PublishError::EmptyPostContent).at(PublishStage::Idle);
        }

        let url = if self.settings.simulate {
            self.simulate_post(file, text).await
        } else {
            if *session == Session::Unchecked {
                self.check_session().await.at(PublishStage::PreflightChecked)?;
                *session = Session::Ready;
            }
            self.post(text).await?
        };

        debug!("{} reached {:?}", file_name(file), PublishStage::Parsed);
        record_post(records, &uuid, &metadata.title, &url, timestamp());
        let recorded = match self.store.save(records) {
            Ok(()) => true,
            Err(e) => {
                error!("Index save failed after posting {}: {}", file_name(file), e);
                self.notifier.notify(&format!(
                    "Critical: Failed to save updated AT Protocol index after posting {}!",
                    file_name(file)
                ));
                false
            }
        };
        debug!("{} reached {:?}", file_name(file), PublishStage::Recorded);

        Ok(Receipt {
            token: url.clone(),
            locator: url,
            recorded,
        })
    }

    async fn check_session(&self) -> Result<(), PublishError> {
        match bsky_connectivity(self.runner.as_ref(), &self.settings.tool).await {
            Connectivity::Ready { version } => {
                info!("{} CLI ready ({})", self.settings.tool, version);
                Ok(())
            }
            Connectivity::ToolMissing | Connectivity::ToolBroken => {
                Err(PublishError::ToolUnavailable {
                    program: self.settings.tool.clone(),
                })
            }
            Connectivity::NotAuthenticated => Err(PublishError::NotAuthenticated),
        }
    }

    async fn simulate_post(&self, file: &Path, text: &str) -> String {
        tokio::time::sleep(self.settings.simulate_delay()).await;
        let mut rkey = Uuid::new_v4().simple().to_string();
        rkey.truncate(13);
        let url = format!(
            "https://bsky.app/profile/{}/post/{}",
            self.settings.simulated_handle, rkey
        );
        info!(
            "Simulated post for {} ({} chars): {}",
            file_name(file),
            text.chars().count(),
            url
        );
        url
    }

    async fn post(&self, text: &str) -> Result<String, StageError> {
        let tool = &self.settings.tool;
        info!("Posting to Bluesky...");
        self.notifier.notify("Posting to Bluesky...");

        let output = self
            .runner
            .run(tool, &args(["post", text]))
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

        debug!("{} post stdout:\n{}", tool, output.stdout);
        if !output.success() {
            return Err(tool_failed(tool, &output)).at(PublishStage::Invoked);
        }

        let url = parse_post_locator(&output.stdout)
            .ok_or_else(|| PublishError::ResultUnparseable {
                program: tool.clone(),
                excerpt: excerpt(&output.stdout),
            })
            .at(PublishStage::Invoked)?;

        info!("Successfully posted to Bluesky: {}", url);
        Ok(url)
    }
}
