//! Arweave archive index (`{"files": [...]}`)
//!
//! One record per note; every successful upload appends a hash entry, so the
//! record's history is the list of all versions ever deployed.

use serde::{Deserialize, Serialize};

use super::{find_or_append, IndexRecord};

/// Gateway prefix for links stored in the archive
pub const ARWEAVE_GATEWAY: &str = "https://www.arweave.net";

/// One deployed version of a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveHash {
    /// Arweave transaction id
    pub hash: String,
    /// RFC 3339 upload time
    pub timestamp: String,
    /// Gateway URL of the transaction
    pub link: String,
}

impl ArchiveHash {
    pub fn new(hash: &str, timestamp: String) -> Self {
        Self {
            hash: hash.to_string(),
            timestamp,
            link: format!("{ARWEAVE_GATEWAY}/{hash}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub arweave_hashes: Vec<ArchiveHash>,
}

impl IndexRecord for ArchiveRecord {
    const COLLECTION_KEY: &'static str = "files";

    fn identifier(&self) -> &str {
        &self.uuid
    }
}

/// Append an upload to the record for `uuid`, creating the record if needed.
///
/// The title is refreshed from the note on every upload.
pub fn record_upload(records: &mut Vec<ArchiveRecord>, uuid: &str, title: &str, entry: ArchiveHash) {
    find_or_append(
        records,
        uuid,
        || ArchiveRecord {
            uuid: uuid.to_string(),
            title: title.to_string(),
            arweave_hashes: vec![entry.clone()],
        },
        |record| {
            record.title = title.to_string();
            record.arweave_hashes.push(entry.clone());
        },
    );
}
