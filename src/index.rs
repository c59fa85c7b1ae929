use crate::models::{EntityId, LanguageCode};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Per-language title to entity mapping.
///
/// Built once by the entity pass, read-only afterwards. Inserting an existing
/// `(language, title)` pair overwrites it, so the last sitelink in dump order wins.
#[derive(Debug, Default)]
pub struct IdentifierIndex {
    titles: FxHashMap<LanguageCode, FxHashMap<String, EntityId>>,
}

impl IdentifierIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(titles: FxHashMap<LanguageCode, FxHashMap<String, EntityId>>) -> Self {
        Self { titles }
    }

    pub fn maps(&self) -> &FxHashMap<LanguageCode, FxHashMap<String, EntityId>> {
        &self.titles
    }

    /// Returns the entity previously stored under this key, if any.
    pub fn insert(&mut self, lang: &LanguageCode, title: &str, id: EntityId) -> Option<EntityId> {
        let previous = self
            .titles
            .entry(lang.clone())
            .or_default()
            .insert(title.to_string(), id);
        if let Some(ref old) = previous {
            debug!(lang = %lang, title, replaced = %old, "Sitelink title overwritten");
        }
        previous
    }

    /// Exact lookup first, then the same title with its first letter
    /// upper-cased, which is how the wiki stores it.
    pub fn resolve(&self, lang: &str, title: &str) -> Option<&EntityId> {
        let titles = self.titles.get(lang)?;
        if let Some(id) = titles.get(title) {
            return Some(id);
        }
        let capitalized = capitalize_first(title)?;
        if capitalized == title {
            return None;
        }
        titles.get(capitalized.as_str())
    }

    /// Total number of `(language, title)` entries.
    pub fn len(&self) -> usize {
        self.titles.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn languages(&self) -> usize {
        self.titles.len()
    }

    /// Entries sorted by language then title, for stable output.
    pub fn sorted_entries(&self) -> Vec<(&LanguageCode, &str, &EntityId)> {
        let mut entries: Vec<_> = self
            .titles
            .iter()
            .flat_map(|(lang, titles)| titles.iter().map(move |(t, id)| (lang, t.as_str(), id)))
            .collect();
        entries.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }
}

/// Applies the wiki title convention: underscores read as spaces, surrounding
/// whitespace and any `#fragment` dropped, first character upper-cased.
pub fn canonical_title(raw: &str) -> Option<String> {
    let spaced = raw.replace('_', " ");
    let without_fragment = match spaced.split_once('#') {
        Some((before, _)) => before,
        None => spaced.as_str(),
    };
    capitalize_first(without_fragment.trim())
}

pub fn capitalize_first(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let first = chars.next()?;
    let mut out = String::with_capacity(text.len());
    out.extend(first.to_uppercase());
    out.push_str(chars.as_str());
    Some(out)
}
