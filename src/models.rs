use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::Path;

/// Short language tag such as `en`; selects the `<code>wiki` sitelink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Infers the language from a dump file name like `enwiki-20210301-pages-articles.xml.bz2`.
    pub fn from_dump_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (code, _) = name.split_once("wiki")?;
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            return None;
        }
        Some(Self(code.to_string()))
    }
}

impl Borrow<str> for LanguageCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque entity identifier from the entity graph, e.g. `Q90`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One article reconstructed from the XML stream; dropped once processed.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub text: Option<String>,
    pub redirect: bool,
}

/// An entity occurrence inside a segment. Offsets count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub surface: String,
    pub entity: EntityId,
    pub start: usize,
    pub end: usize,
}

/// Plain text of one segment with the mentions found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedSegment {
    pub text: String,
    pub mentions: Vec<Mention>,
}

/// One line of `gold_entities_<lang>.jsonl`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GoldRecord {
    pub article_id: String,
    pub article_title: String,
    pub context: String,
    pub entity: EntityId,
    pub mention: String,
    pub start: usize,
    pub end: usize,
}
