use crate::config::{
    DEFAULT_LANGUAGES, ENTITY_LOG_INTERVAL, EXCLUDED_ITEMS, PROGRESS_INTERVAL, PROP_INSTANCE_OF,
    PROP_SUBCLASS_OF,
};
use crate::index::IdentifierIndex;
use crate::models::{EntityId, LanguageCode};
use crate::parser::open_dump;
use crate::stats::{spinner, EntityStats};
use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::{Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::io::BufRead;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Entity → language → aliases in declaration order.
pub type AliasTable = FxHashMap<EntityId, FxHashMap<LanguageCode, Vec<String>>>;
/// Entity → language → description.
pub type DescriptionTable = FxHashMap<EntityId, FxHashMap<LanguageCode, String>>;
/// Entity → `(property, targets)` in declaration order.
pub type PropertyTable = FxHashMap<EntityId, Vec<(String, Vec<EntityId>)>>;

/// Which records of the entity dump are kept, and for which languages.
#[derive(Debug, Clone)]
pub struct EntityFilter {
    pub languages: Vec<LanguageCode>,
    /// Targets of "instance of"/"subclass of" that exclude a record.
    pub excluded: FxHashSet<String>,
    /// Stop after this many lines.
    pub limit: Option<u64>,
}

impl Default for EntityFilter {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES
                .iter()
                .map(|l| LanguageCode::new(*l))
                .collect(),
            excluded: EXCLUDED_ITEMS.iter().map(|id| id.to_string()).collect(),
            limit: None,
        }
    }
}

impl EntityFilter {
    pub fn with_languages(mut self, languages: Vec<LanguageCode>) -> Self {
        if !languages.is_empty() {
            self.languages = languages;
        }
        self
    }

    pub fn exclude<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    fn language(&self, code: &str) -> Option<&LanguageCode> {
        self.languages.iter().find(|l| l.as_str() == code)
    }

    fn site_language(&self, site: &str) -> Option<&LanguageCode> {
        self.language(site.strip_suffix("wiki")?)
    }

    /// Any non-deprecated "instance of" or "subclass of" statement pointing into
    /// the exclusion set drops the record.
    fn excludes(&self, entity: &RawEntity) -> bool {
        entity
            .claims
            .iter()
            .filter(|(property, _)| property == PROP_INSTANCE_OF || property == PROP_SUBCLASS_OF)
            .flat_map(|(_, statements)| statements)
            .filter(|statement| statement.rank != Rank::Deprecated)
            .filter_map(Statement::target)
            .any(|target| self.excluded.contains(&target))
    }
}

#[derive(Deserialize)]
struct RawEntity {
    #[serde(rename = "type", default)]
    kind: String,
    id: String,
    #[serde(default, deserialize_with = "ordered_entries")]
    claims: Vec<(String, Vec<Statement>)>,
    #[serde(default, deserialize_with = "ordered_entries")]
    sitelinks: Vec<(String, Sitelink)>,
    #[serde(default, deserialize_with = "ordered_entries")]
    descriptions: Vec<(String, LocalizedValue)>,
    #[serde(default, deserialize_with = "ordered_entries")]
    aliases: Vec<(String, Vec<LocalizedValue>)>,
}

#[derive(Deserialize)]
struct Sitelink {
    title: String,
}

#[derive(Deserialize)]
struct LocalizedValue {
    value: String,
}

#[derive(Deserialize)]
struct Statement {
    mainsnak: Snak,
    #[serde(default)]
    rank: Rank,
}

impl Statement {
    fn target(&self) -> Option<String> {
        match &self.mainsnak.datavalue.as_ref()?.value {
            SnakValue::Entity {
                entity_type,
                id,
                numeric_id,
            } => id.clone().or_else(|| {
                let prefix = match entity_type.as_str() {
                    "item" => 'Q',
                    "property" => 'P',
                    _ => return None,
                };
                numeric_id.map(|n| format!("{}{}", prefix, n))
            }),
            SnakValue::Other(_) => None,
        }
    }
}

#[derive(Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Rank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct Snak {
    #[serde(default)]
    datavalue: Option<DataValue>,
}

#[derive(Deserialize)]
struct DataValue {
    value: SnakValue,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnakValue {
    Entity {
        #[serde(rename = "entity-type")]
        entity_type: String,
        #[serde(default)]
        id: Option<String>,
        #[serde(rename = "numeric-id", default)]
        numeric_id: Option<u64>,
    },
    Other(IgnoredAny),
}

/// JSON objects as `(key, value)` pairs in document order. Empty objects are
/// sometimes written as `[]` in the dump, which reads as no entries.
fn ordered_entries<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct EntriesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map or an empty list")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, T>()? {
                entries.push(entry);
            }
            Ok(entries)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(EntriesVisitor(PhantomData))
}

/// Strips the surrounding whitespace and the trailing comma of a dump line.
/// Returns `None` for lines that cannot hold a record (`[`, `]`, blank).
fn record_body(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let body = trimmed.strip_suffix(',').unwrap_or(trimmed);
    (body.len() > 1).then_some(body)
}

/// The four tables produced by one pass over the entity dump.
#[derive(Debug, Default)]
pub struct EntityTables {
    pub index: IdentifierIndex,
    pub aliases: AliasTable,
    pub descriptions: DescriptionTable,
    pub properties: PropertyTable,
}

impl EntityTables {
    pub fn build(path: &str, filter: &EntityFilter, stats: &EntityStats) -> Result<Self> {
        let reader = open_dump(path)
            .with_context(|| format!("Failed to open entity dump at: {}", path))?;
        info!(
            path,
            languages = filter.languages.len(),
            "Reading entity dump"
        );
        Self::from_reader(reader, filter, stats)
    }

    /// Streams the dump line by line. Only I/O failures are errors; unparseable
    /// lines are counted and skipped.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        filter: &EntityFilter,
        stats: &EntityStats,
    ) -> Result<Self> {
        let mut tables = Self::default();
        let pb = spinner("Reading entities");
        let mut line = Vec::with_capacity(64 * 1024);

        loop {
            if filter.limit.is_some_and(|limit| stats.lines() >= limit) {
                info!(limit = stats.lines(), "Line limit reached");
                break;
            }
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .context("Failed to read entity dump")?;
            if read == 0 {
                break;
            }
            stats.inc_lines();

            let lines = stats.lines();
            if lines % PROGRESS_INTERVAL == 0 {
                pb.set_position(lines);
            }
            if lines % ENTITY_LOG_INTERVAL == 0 {
                info!(lines, kept = stats.kept(), "Processed entity dump lines");
            }

            let Ok(text) = std::str::from_utf8(&line) else {
                debug!(line = lines, "Skipping entity line with invalid UTF-8");
                stats.inc_malformed();
                continue;
            };
            let Some(body) = record_body(text) else {
                continue;
            };
            match serde_json::from_str::<RawEntity>(body) {
                Ok(entity) => tables.add(entity, filter, stats),
                Err(e) => {
                    debug!(line = lines, error = %e, "Skipping malformed entity line");
                    stats.inc_malformed();
                }
            }
        }

        pb.finish_and_clear();
        info!(
            lines = stats.lines(),
            kept = stats.kept(),
            titles = tables.index.len(),
            "Entity tables built"
        );
        Ok(tables)
    }

    fn add(&mut self, entity: RawEntity, filter: &EntityFilter, stats: &EntityStats) {
        let has_description = entity.descriptions.iter().any(|(_, d)| !d.value.is_empty());
        if entity.kind != "item" || !has_description {
            stats.inc_skipped();
            return;
        }
        if filter.excludes(&entity) {
            stats.inc_excluded();
            return;
        }
        stats.inc_kept();

        let id = EntityId::new(entity.id);

        let relations: Vec<(String, Vec<EntityId>)> = entity
            .claims
            .iter()
            .filter_map(|(property, statements)| {
                let targets: Vec<EntityId> = statements
                    .iter()
                    .filter_map(Statement::target)
                    .map(EntityId::new)
                    .collect();
                (!targets.is_empty()).then(|| (property.clone(), targets))
            })
            .collect();
        if !relations.is_empty() {
            self.properties
                .entry(id.clone())
                .or_default()
                .extend(relations);
        }

        for (site, link) in entity.sitelinks {
            if let Some(lang) = filter.site_language(&site) {
                if self.index.insert(lang, &link.title, id.clone()).is_some() {
                    stats.inc_title_overwrites();
                }
            }
        }

        for (code, values) in entity.aliases {
            let Some(lang) = filter.language(&code) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            self.aliases
                .entry(id.clone())
                .or_default()
                .entry(lang.clone())
                .or_default()
                .extend(values.into_iter().map(|v| v.value));
        }

        for (code, description) in entity.descriptions {
            let Some(lang) = filter.language(&code) else {
                continue;
            };
            if description.value.is_empty() {
                continue;
            }
            self.descriptions
                .entry(id.clone())
                .or_default()
                .insert(lang.clone(), description.value);
        }
    }
}
