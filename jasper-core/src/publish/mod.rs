//! Publish orchestration
//!
//! Each file walks a linear state machine with no retries:
//!
//! ```text
//! Idle -> PreflightChecked -> Invoked -> Parsed -> Recorded
//!   \____________\______________\_________\_____> Failed
//! ```
//!
//! A batch is processed sequentially. Per-file failures are reported and the
//! batch continues; failures that no later file can recover from (missing
//! executable, missing wallet or credentials, no session, a closed spend
//! gate) abort the rest of the batch and are reported once.

pub mod arweave;
pub mod atproto;

pub use arweave::ArweavePublisher;
pub use atproto::AtprotoPublisher;

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{file_name, PublishError, PublishErrorKind};
use crate::runner::ToolOutput;

/// Characters of a token shown in success notifications
const TOKEN_PREVIEW_LEN: usize = 10;

/// Characters of tool output kept when a result cannot be parsed
const EXCERPT_LEN: usize = 100;

/// Where a file's publish attempt got to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Idle,
    PreflightChecked,
    Invoked,
    Parsed,
    Recorded,
}

/// Proof of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction id or post url returned by the network
    pub token: String,
    /// Public location of the published note
    pub locator: String,
    /// False when the index could not be saved after publishing
    pub recorded: bool,
}

/// Result of one file in a batch
#[derive(Debug)]
pub enum FileOutcome {
    Published(Receipt),
    Failed {
        /// Last stage the file completed before failing
        stage: PublishStage,
        error: PublishError,
    },
    /// Skipped because the batch was aborted
    NotAttempted,
}

impl FileOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, FileOutcome::Published(_))
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            FileOutcome::Published(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Outcome of a whole batch, in submission order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(PathBuf, FileOutcome)>,
    /// The failure that stopped the batch early, if any
    pub abort: Option<PublishError>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_published()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome(&self, file: &Path) -> Option<&FileOutcome> {
        self.outcomes
            .iter()
            .find(|(path, _)| path == file)
            .map(|(_, outcome)| outcome)
    }

    /// Token published for `file`, if it succeeded
    pub fn token(&self, file: &Path) -> Option<&str> {
        self.outcome(file)
            .and_then(FileOutcome::receipt)
            .map(|r| r.token.as_str())
    }

    /// Report for a batch that never started; every file is marked
    /// not attempted
    pub(crate) fn aborted(files: &[PathBuf], error: PublishError) -> Self {
        Self {
            outcomes: files
                .iter()
                .map(|f| (f.clone(), FileOutcome::NotAttempted))
                .collect(),
            abort: Some(error),
        }
    }

    pub(crate) fn push(&mut self, file: &Path, outcome: FileOutcome) {
        self.outcomes.push((file.to_path_buf(), outcome));
    }

    pub(crate) fn skip_remaining(&mut self, remaining: &[PathBuf]) {
        for file in remaining {
            self.push(file, FileOutcome::NotAttempted);
        }
    }
}

/// A per-file failure tagged with the last completed stage
pub(crate) struct StageError {
    pub stage: PublishStage,
    pub error: PublishError,
}

pub(crate) trait AtStage<T> {
    fn at(self, stage: PublishStage) -> Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T, PublishError> {
    fn at(self, stage: PublishStage) -> Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// First characters of a token, for notifications
pub fn token_preview(token: &str) -> String {
    token.chars().take(TOKEN_PREVIEW_LEN).collect()
}

/// Start of the tool output, kept as context when nothing could be parsed
pub(crate) fn excerpt(output: &str) -> String {
    output.trim().chars().take(EXCERPT_LEN).collect()
}

/// Stand-in 43-character transaction id used in simulation mode
pub(crate) fn simulated_transaction_id() -> String {
    let mut id = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    id.truncate(43);
    id
}

/// Timestamp stored alongside each publication
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Map a non-zero exit to [`PublishError::ToolFailed`]
pub(crate) fn tool_failed(program: &str, output: &ToolOutput) -> PublishError {
    PublishError::ToolFailed {
        program: program.to_string(),
        code: output.code,
        stderr: output.stderr.trim().to_string(),
    }
}

/// Operator-facing line for a per-file failure
pub(crate) fn failure_message(action: &str, file: &Path, error: &PublishError) -> String {
    match error.kind() {
        PublishErrorKind::ConfigurationMissing => error.to_string(),
        _ => format!("Failed to {} {}: {}", action, file_name(file), error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_preview() {
        assert_eq!(token_preview("abcdefghijklmnop"), "abcdefghij");
        assert_eq!(token_preview("abc"), "abc");
    }

    #[test]
    fn test_simulated_transaction_id_shape() {
        let id = simulated_transaction_id();
        assert_eq!(id.len(), 43);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, simulated_transaction_id());
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), 100);
        assert_eq!(excerpt("  ok \n"), "ok");
    }

    #[test]
    fn test_report_counts() {
        let mut report = BatchReport::default();
        report.push(
            Path::new("a.md"),
            FileOutcome::Published(Receipt {
                token: "tx".into(),
                locator: "https://www.arweave.net/tx".into(),
                recorded: true,
            }),
        );
        report.push(
            Path::new("b.md"),
            FileOutcome::Failed {
                stage: PublishStage::Idle,
                error: PublishError::MissingIdentifier {
                    file: PathBuf::from("b.md"),
                },
            },
        );
        report.skip_remaining(&[PathBuf::from("c.md")]);

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.token(Path::new("a.md")), Some("tx"));
        assert_eq!(report.token(Path::new("b.md")), None);
        assert!(matches!(
            report.outcome(Path::new("c.md")),
            Some(FileOutcome::NotAttempted)
        ));
    }
}
