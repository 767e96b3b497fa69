//! Publication status of a note, derived from an index snapshot
//!
//! Resolution is a pure function of (identifier, snapshot). Callers own the
//! snapshot and decide when to reload it.

use crate::index::{ArchiveRecord, IndexRecord, PostRecord};
use std::fmt;

/// Where a note stands on one network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationStatus {
    /// The note has no uuid and cannot be tracked
    NoIdentifier,
    /// The index is missing, empty or failed to load
    IndexUnavailable,
    /// The index has no record for this uuid
    NotPublished,
    /// Record exists but has no post url yet (single-slot indexes)
    Draft,
    /// Record exists with `n` published versions
    Published(usize),
    /// Record exists with an empty upload history
    TrackedNoUploads,
}

/// How a record reports its own publication state
pub trait Publication: IndexRecord {
    fn publication_status(&self) -> PublicationStatus;
}

impl Publication for ArchiveRecord {
    fn publication_status(&self) -> PublicationStatus {
        match self.arweave_hashes.len() {
            0 => PublicationStatus::TrackedNoUploads,
            n => PublicationStatus::Published(n),
        }
    }
}

impl Publication for PostRecord {
    fn publication_status(&self) -> PublicationStatus {
        match self.url.as_deref() {
            Some(url) if !url.is_empty() => PublicationStatus::Published(1),
            _ => PublicationStatus::Draft,
        }
    }
}

/// True when a frontmatter uuid value cannot identify a note
pub fn is_untracked(identifier: Option<&str>) -> bool {
    match identifier.map(str::trim) {
        None => true,
        Some(id) => id.is_empty() || id == "N/A",
    }
}

/// Resolve the status of `identifier` against `snapshot`
pub fn resolve<R: Publication>(identifier: Option<&str>, snapshot: &[R]) -> PublicationStatus {
    if is_untracked(identifier) {
        return PublicationStatus::NoIdentifier;
    }
    if snapshot.is_empty() {
        return PublicationStatus::IndexUnavailable;
    }

    let identifier = identifier.map(str::trim).unwrap_or_default();
    snapshot
        .iter()
        .find(|record| record.identifier() == identifier)
        .map(Publication::publication_status)
        .unwrap_or(PublicationStatus::NotPublished)
}

impl PublicationStatus {
    pub fn is_published(&self) -> bool {
        matches!(self, PublicationStatus::Published(_))
    }

    /// Label in Arweave vocabulary ("Uploaded (2 versions)")
    pub fn archive_label(&self) -> String {
        match self {
            PublicationStatus::NoIdentifier => "No UUID found".to_string(),
            PublicationStatus::IndexUnavailable => {
                "Not uploaded (archive not found or empty)".to_string()
            }
            PublicationStatus::NotPublished => "Not uploaded".to_string(),
            PublicationStatus::Draft => "Tracked in archive, not uploaded".to_string(),
            PublicationStatus::Published(n) => {
                format!("Uploaded ({n} version{})", if *n == 1 { "" } else { "s" })
            }
            PublicationStatus::TrackedNoUploads => {
                "Tracked in archive, but no uploads recorded".to_string()
            }
        }
    }

    /// Label in Bluesky vocabulary ("Posted", "Draft")
    pub fn post_label(&self) -> String {
        match self {
            PublicationStatus::NoIdentifier => "No UUID found".to_string(),
            PublicationStatus::IndexUnavailable => {
                "Not posted (index not found or empty)".to_string()
            }
            PublicationStatus::NotPublished => "Not posted".to_string(),
            PublicationStatus::Draft | PublicationStatus::TrackedNoUploads => "Draft".to_string(),
            PublicationStatus::Published(_) => "Posted".to_string(),
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationStatus::NoIdentifier => write!(f, "no identifier"),
            PublicationStatus::IndexUnavailable => write!(f, "index unavailable"),
            PublicationStatus::NotPublished => write!(f, "not published"),
            PublicationStatus::Draft => write!(f, "draft"),
            PublicationStatus::Published(n) => write!(f, "published ({n})"),
            PublicationStatus::TrackedNoUploads => write!(f, "tracked, no uploads"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ArchiveHash;

    fn archive(uuid: &str, versions: usize) -> ArchiveRecord {
        ArchiveRecord {
            uuid: uuid.to_string(),
            title: "T".to_string(),
            arweave_hashes: (0..versions)
                .map(|i| ArchiveHash::new(&format!("h{i}"), "t".to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_priority_order() {
        let empty: Vec<ArchiveRecord> = Vec::new();
        let snapshot = vec![archive("abc", 1)];

        assert_eq!(resolve(None, &snapshot), PublicationStatus::NoIdentifier);
        assert_eq!(resolve(Some(""), &snapshot), PublicationStatus::NoIdentifier);
        assert_eq!(resolve(Some("N/A"), &snapshot), PublicationStatus::NoIdentifier);
        assert_eq!(resolve(Some("abc"), &empty), PublicationStatus::IndexUnavailable);
        assert_eq!(resolve(Some("zzz"), &snapshot), PublicationStatus::NotPublished);
        assert_eq!(resolve(Some("abc"), &snapshot), PublicationStatus::Published(1));
    }

    #[test]
    fn test_historied_counts_and_inconsistent_state() {
        let snapshot = vec![archive("a", 3), archive("b", 0)];
        assert_eq!(resolve(Some("a"), &snapshot), PublicationStatus::Published(3));
        assert_eq!(resolve(Some("b"), &snapshot), PublicationStatus::TrackedNoUploads);
        assert_eq!(
            resolve(Some("a"), &snapshot).archive_label(),
            "Uploaded (3 versions)"
        );
    }

    #[test]
    fn test_single_slot_draft_and_posted() {
        let mut posted = PostRecord::new("p", "T");
        posted.url = Some("https://bsky.app/profile/x/post/1".to_string());
        let snapshot = vec![PostRecord::new("d", "T"), posted];

        assert_eq!(resolve(Some("d"), &snapshot), PublicationStatus::Draft);
        assert_eq!(resolve(Some("p"), &snapshot), PublicationStatus::Published(1));
        assert_eq!(resolve(Some("p"), &snapshot).post_label(), "Posted");
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let snapshot = vec![archive("abc", 2)];
        let first = resolve(Some("abc"), &snapshot);
        let second = resolve(Some("abc"), &snapshot);
        assert_eq!(first, second);
    }
}
