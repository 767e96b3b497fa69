//! Publish error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

use crate::probe::SpendBlocked;

/// Coarse classification used to decide how a batch reacts to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishErrorKind {
    /// Identifier, wallet, credentials or post text is missing
    ConfigurationMissing,
    /// The external executable is not on PATH
    ToolUnavailable,
    /// The social network CLI has no authenticated session
    NotAuthenticated,
    /// The external tool exited non-zero
    ToolFailed,
    /// The tool exited zero but printed no recognizable result
    ResultUnparseable,
    /// The wallet balance is unknown or below the queue's cost
    SpendBlocked,
}

/// Per-file (or per-batch) publish failure
#[derive(Error, Debug)]
pub enum PublishError {
    /// The note carries no `uuid` in its frontmatter
    #[error("Skipping {}: No UUID found in frontmatter.", file_name(.file))]
    MissingIdentifier { file: PathBuf },

    /// The note could not be read from disk
    #[error("Could not read {}: {source}", file_name(.file))]
    NoteUnreadable {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No Arweave wallet could be resolved
    #[error("Arweave upload cannot proceed: Wallet path not found.")]
    MissingWallet,

    /// No Bluesky credentials in the environment or credentials file
    #[error("AT Protocol posting cannot proceed: No credentials found.")]
    MissingCredentials,

    /// Nothing to post
    #[error("Cannot post: Empty post content")]
    EmptyPostContent,

    /// Executable missing from PATH
    #[error("'{program}' command not found. Please ensure it is installed and in PATH.")]
    ToolUnavailable { program: String },

    /// `bsky show-session` failed
    #[error("Cannot post: Not authenticated with Bluesky. Please run 'bsky login' in terminal")]
    NotAuthenticated,

    /// Non-zero exit from the external tool
    #[error("'{program}' failed (code {}): {stderr}", exit_label(.code))]
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Zero exit, but the result token could not be extracted
    #[error("'{program}' reported success but no result could be extracted. Output: {excerpt}")]
    ResultUnparseable { program: String, excerpt: String },

    /// The spend gate refused the upload batch
    #[error("Arweave upload blocked: {0}")]
    SpendBlocked(#[from] SpendBlocked),
}

impl PublishError {
    pub fn kind(&self) -> PublishErrorKind {
        match self {
            PublishError::MissingIdentifier { .. }
            | PublishError::NoteUnreadable { .. }
            | PublishError::MissingWallet
            | PublishError::MissingCredentials
            | PublishError::EmptyPostContent => PublishErrorKind::ConfigurationMissing,
            PublishError::ToolUnavailable { .. } => PublishErrorKind::ToolUnavailable,
            PublishError::NotAuthenticated => PublishErrorKind::NotAuthenticated,
            PublishError::ToolFailed { .. } => PublishErrorKind::ToolFailed,
            PublishError::ResultUnparseable { .. } => PublishErrorKind::ResultUnparseable,
            PublishError::SpendBlocked(_) => PublishErrorKind::SpendBlocked,
        }
    }

    /// Whether the remaining files of a batch can be skipped outright
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            PublishError::ToolUnavailable { .. }
                | PublishError::NotAuthenticated
                | PublishError::MissingWallet
                | PublishError::MissingCredentials
                | PublishError::SpendBlocked(_)
        )
    }

    /// Log at the severity the failure deserves.
    ///
    /// An unparseable result after a zero exit is louder than a plain tool
    /// failure: the network may already hold the content and the funds.
    pub fn log(&self) {
        match self.kind() {
            PublishErrorKind::ResultUnparseable => {
                tracing::error!(target: "jasper::publish", "RESULT LOST: {}", self);
            }
            PublishErrorKind::ToolFailed | PublishErrorKind::ConfigurationMissing => {
                tracing::warn!("{}", self);
            }
            PublishErrorKind::ToolUnavailable
            | PublishErrorKind::NotAuthenticated
            | PublishErrorKind::SpendBlocked => {
                tracing::error!("{}", self);
            }
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

pub(crate) fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = PublishError::MissingIdentifier {
            file: PathBuf::from("notes/a.md"),
        };
        assert_eq!(err.kind(), PublishErrorKind::ConfigurationMissing);
        assert!(!err.aborts_batch());
        assert_eq!(err.to_string(), "Skipping a.md: No UUID found in frontmatter.");

        let err = PublishError::ToolUnavailable {
            program: "arkb".to_string(),
        };
        assert!(err.aborts_batch());
    }

    #[test]
    fn test_tool_failed_message_includes_code() {
        let err = PublishError::ToolFailed {
            program: "arkb".to_string(),
            code: Some(2),
            stderr: "insufficient funds".to_string(),
        };
        assert_eq!(err.to_string(), "'arkb' failed (code 2): insufficient funds");
        assert_eq!(err.kind(), PublishErrorKind::ToolFailed);
    }

    #[test]
    fn test_spend_blocked_aborts_batch() {
        let err = PublishError::from(SpendBlocked::BalanceUnavailable);
        assert_eq!(err.kind(), PublishErrorKind::SpendBlocked);
        assert!(err.aborts_batch());
        assert_eq!(
            err.to_string(),
            "Arweave upload blocked: Wallet balance unavailable; refusing to spend."
        );
    }
}
