//! Bluesky posts index (`{"posts": [...]}`)
//!
//! Single-slot: reposting a note overwrites its url and timestamp.

use serde::{Deserialize, Serialize};

use super::{find_or_append, IndexRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    /// Web URL (or raw AT URI) of the current post; `None` while a draft
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub posted_at: Option<String>,
}

impl PostRecord {
    /// A draft record with no post yet
    pub fn new(uuid: &str, title: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            title: title.to_string(),
            url: None,
            posted_at: None,
        }
    }
}

impl IndexRecord for PostRecord {
    const COLLECTION_KEY: &'static str = "posts";

    fn identifier(&self) -> &str {
        &self.uuid
    }
}

/// Point the record for `uuid` at a new post, creating the record if needed
pub fn record_post(
    records: &mut Vec<PostRecord>,
    uuid: &str,
    title: &str,
    url: &str,
    posted_at: String,
) {
    find_or_append(
        records,
        uuid,
        || PostRecord {
            uuid: uuid.to_string(),
            title: title.to_string(),
            url: Some(url.to_string()),
            posted_at: Some(posted_at.clone()),
        },
        |record| {
            record.title = title.to_string();
            record.url = Some(url.to_string());
            record.posted_at = Some(posted_at.clone());
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_post_overwrites_slot() {
        let mut records = vec![PostRecord::new("n1", "Draft")];

        record_post(&mut records, "n1", "Note", "https://bsky.app/profile/a/post/1", "t1".into());
        record_post(&mut records, "n1", "Note", "https://bsky.app/profile/a/post/2", "t2".into());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url.as_deref(), Some("https://bsky.app/profile/a/post/2"));
        assert_eq!(records[0].posted_at.as_deref(), Some("t2"));
    }

    #[test]
    fn test_null_url_round_trips() {
        let json = serde_json::to_value(PostRecord::new("n1", "T")).unwrap();
        assert!(json["url"].is_null());
        assert!(json["posted_at"].is_null());
    }
}
