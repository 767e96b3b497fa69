//! Note metadata from YAML frontmatter
//!
//! Only the keys the publishers need are extracted: `uuid`, `title` and
//! `type`. Scalars of any YAML type are stringified.

use serde_yaml_ng::{Mapping, Value};
use std::path::Path;
use tracing::warn;

use crate::status::is_untracked;

const DEFAULT_TITLE: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteMetadata {
    pub uuid: Option<String>,
    pub title: String,
    pub note_type: Option<String>,
}

impl Default for NoteMetadata {
    fn default() -> Self {
        Self {
            uuid: None,
            title: DEFAULT_TITLE.to_string(),
            note_type: None,
        }
    }
}

impl NoteMetadata {
    /// Read and parse the frontmatter of a note on disk
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content).unwrap_or_else(|e| {
            warn!("Could not parse frontmatter for {}: {}", path.display(), e);
            Self::default()
        }))
    }

    /// Like [`NoteMetadata::load`] but degrades to defaults when unreadable
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("Could not read {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Parse frontmatter from note text; text without frontmatter yields defaults
    pub fn parse(content: &str) -> Result<Self, serde_yaml_ng::Error> {
        let Some(block) = frontmatter_block(content) else {
            return Ok(Self::default());
        };

        let mapping: Mapping = match serde_yaml_ng::from_str::<Value>(block)? {
            Value::Mapping(mapping) => mapping,
            _ => return Ok(Self::default()),
        };

        let get = |key: &str| mapping.get(key).and_then(scalar_to_string);

        Ok(Self {
            uuid: get("uuid").filter(|id| !is_untracked(Some(id))),
            title: get("title")
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            note_type: get("type").filter(|t| !t.is_empty()),
        })
    }

    pub fn identifier(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
}

fn frontmatter_block(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content
        .strip_prefix("---\r\n")
        .or_else(|| content.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_known_keys() {
        let note = "---\nuuid: 8f14e45f-ceea-4b3c\ntitle: Field Notes\ntype: essay\ntags: [a]\n---\n# Body\n";
        let meta = NoteMetadata::parse(note).unwrap();
        assert_eq!(meta.identifier(), Some("8f14e45f-ceea-4b3c"));
        assert_eq!(meta.title, "Field Notes");
        assert_eq!(meta.note_type.as_deref(), Some("essay"));
    }

    #[test]
    fn test_missing_frontmatter_is_untracked() {
        let meta = NoteMetadata::parse("# Just a heading\n").unwrap();
        assert_eq!(meta, NoteMetadata::default());
        assert_eq!(meta.title, "Untitled");
    }

    #[test]
    fn test_placeholder_uuid_is_untracked() {
        let meta = NoteMetadata::parse("---\nuuid: N/A\n---\n").unwrap();
        assert_eq!(meta.uuid, None);
    }

    #[test]
    fn test_numeric_uuid_is_stringified() {
        let meta = NoteMetadata::parse("---\nuuid: 12345\n---\nbody").unwrap();
        assert_eq!(meta.identifier(), Some("12345"));
    }

    #[test]
    fn test_unterminated_frontmatter_yields_defaults() {
        let meta = NoteMetadata::parse("---\nuuid: abc\nno closing fence").unwrap();
        assert_eq!(meta.uuid, None);
    }
}
