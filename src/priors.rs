use crate::config::{ARTICLE_LOG_INTERVAL, PROGRESS_INTERVAL};
use crate::content::is_meta_title;
use crate::index::canonical_title;
use crate::links::{scan, LinkKind, LinkSpan};
use crate::models::{LanguageCode, Page};
use crate::parser::WikiReader;
use crate::stats::{spinner, ArticleStats};
use anyhow::{Context, Result};
use memchr::memmem;
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::fmt;
use tracing::{debug, info, warn};

/// Link target keyed by the wiki it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub lang: LanguageCode,
    pub title: String,
}

impl EntityKey {
    pub fn new(lang: LanguageCode, title: impl Into<String>) -> Self {
        Self {
            lang,
            title: title.into(),
        }
    }
}

/// Written as `<lang>_<title>`.
impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lang, self.title)
    }
}

/// One row of the prior table, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorRow<'a> {
    pub alias: &'a str,
    pub count: u64,
    pub entity: &'a EntityKey,
}

/// How often each anchor text links to each target, across every dump read.
#[derive(Debug, Default)]
pub struct AliasPriorTable {
    counts: FxHashMap<String, FxHashMap<EntityKey, u64>>,
}

impl AliasPriorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alias: &str, entity: EntityKey) {
        if !self.counts.contains_key(alias) {
            self.counts.insert(alias.to_string(), FxHashMap::default());
        }
        if let Some(targets) = self.counts.get_mut(alias) {
            *targets.entry(entity).or_insert(0) += 1;
        }
    }

    pub fn count(&self, alias: &str, entity: &EntityKey) -> u64 {
        self.counts
            .get(alias)
            .and_then(|targets| targets.get(entity))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct aliases.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Aliases ascending; within an alias, count descending then entity.
    pub fn sorted_rows(&self) -> Vec<PriorRow<'_>> {
        let mut rows: Vec<PriorRow<'_>> = self
            .counts
            .iter()
            .flat_map(|(alias, targets)| {
                targets.iter().map(move |(entity, count)| PriorRow {
                    alias,
                    count: *count,
                    entity,
                })
            })
            .collect();
        rows.sort_unstable_by(|a, b| {
            (a.alias, Reverse(a.count), a.entity).cmp(&(b.alias, Reverse(b.count), b.entity))
        });
        rows
    }

    /// Total link count per entity over all of its aliases, most linked first.
    pub fn entity_frequencies(&self) -> Vec<(&EntityKey, u64)> {
        let mut totals: FxHashMap<&EntityKey, u64> = FxHashMap::default();
        for targets in self.counts.values() {
            for (entity, count) in targets {
                *totals.entry(entity).or_insert(0) += count;
            }
        }
        let mut totals: Vec<_> = totals.into_iter().collect();
        totals.sort_unstable_by(|a, b| (Reverse(a.1), a.0).cmp(&(Reverse(b.1), b.0)));
        totals
    }
}

/// `(alias, title)` for a link, or `None` when it should not be counted.
fn alias_pair(link: &LinkSpan) -> Option<(String, String)> {
    if link.kind == LinkKind::Interwiki {
        return None;
    }
    let target = link.title.replace('_', " ");
    let target = target.trim();
    if is_meta_title(target) {
        return None;
    }
    let title = canonical_title(target)?;
    let page = target.split('#').next().unwrap_or_default().trim();

    let alias = match link.label.as_deref() {
        None => page.to_string(),
        Some(label) => {
            let label = label.replace('_', " ");
            match label.trim() {
                // `[[Title (qualifier)|]]`; without a qualifier there is no alias.
                "" => page.split_once('(')?.0.trim().to_string(),
                label => label.to_string(),
            }
        }
    };
    if alias.is_empty() {
        return None;
    }
    Some((alias, title))
}

/// Counts every link of one page's raw text. Lines are scanned separately so
/// an unbalanced bracket cannot swallow the rest of the page.
pub fn collect_links(text: &str, lang: &LanguageCode, table: &mut AliasPriorTable) -> u64 {
    let finder = memmem::Finder::new("[[");
    let mut counted = 0;
    for line in text.lines() {
        if finder.find(line.as_bytes()).is_none() {
            continue;
        }
        let output = match scan(line) {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "Skipping unscannable line");
                continue;
            }
        };
        for link in &output.links {
            if let Some((alias, title)) = alias_pair(link) {
                table.add(&alias, EntityKey::new(lang.clone(), title));
                counted += 1;
            }
        }
    }
    counted
}

/// Feeds pages into `table`, stopping after `limit` pages.
pub fn accumulate_pages<I>(
    pages: I,
    lang: &LanguageCode,
    limit: Option<u64>,
    mut table: AliasPriorTable,
    stats: &ArticleStats,
) -> AliasPriorTable
where
    I: IntoIterator<Item = Page>,
{
    let pb = spinner(&format!("Counting {} links", lang));
    let mut read: u64 = 0;

    for page in pages {
        if limit.is_some_and(|limit| read >= limit) {
            info!(lang = %lang, limit = read, "Page limit reached");
            break;
        }
        read += 1;
        stats.inc_pages();
        if read % PROGRESS_INTERVAL == 0 {
            pb.set_position(read);
        }
        if read % ARTICLE_LOG_INTERVAL == 0 {
            info!(lang = %lang, pages = read, aliases = table.len(), "Counting links");
        }

        let Some(text) = page.text.as_deref() else {
            stats.inc_empty();
            continue;
        };
        let links = collect_links(text, lang, &mut table);
        stats.add_links(links);
        if links > 0 {
            stats.inc_articles();
        }
    }

    pb.finish_and_clear();
    table
}

/// One pass over an article dump, accumulating into `table`.
pub fn accumulate_dump(
    path: &str,
    lang: &LanguageCode,
    limit: Option<u64>,
    table: AliasPriorTable,
    stats: &ArticleStats,
) -> Result<AliasPriorTable> {
    let reader = WikiReader::open(path)
        .with_context(|| format!("Failed to open article dump at: {}", path))?;
    info!(path, lang = %lang, "Counting alias priors");
    let table = accumulate_pages(reader, lang, limit, table, stats);
    if table.is_empty() {
        warn!(path, "No links counted in dump");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en() -> LanguageCode {
        LanguageCode::new("en")
    }

    fn key(title: &str) -> EntityKey {
        EntityKey::new(en(), title)
    }

    fn page(id: &str, text: &str) -> Page {
        Page {
            id: id.to_string(),
            title: format!("Page {}", id),
            text: Some(text.to_string()),
            redirect: false,
        }
    }

    fn table_from(text: &str) -> AliasPriorTable {
        let mut table = AliasPriorTable::new();
        collect_links(text, &en(), &mut table);
        table
    }

    #[test]
    fn same_alias_on_two_pages_counts_twice() {
        let pages = vec![
            page("1", "Known as the [[Paris|City of Light]]."),
            page("2", "The [[Paris|City of Light]] again."),
        ];
        let stats = ArticleStats::new();
        let table = accumulate_pages(pages, &en(), None, AliasPriorTable::new(), &stats);
        assert_eq!(table.count("City of Light", &key("Paris")), 2);
        assert_eq!(stats.links(), 2);
        assert_eq!(stats.articles(), 2);
    }

    #[test]
    fn plain_link_uses_title_as_alias() {
        let table = table_from("[[Eiffel_Tower]] and [[paris#History]]");
        assert_eq!(table.count("Eiffel Tower", &key("Eiffel Tower")), 1);
        assert_eq!(table.count("paris", &key("Paris")), 1);
    }

    #[test]
    fn explicit_label_is_verbatim() {
        let table = table_from("[[paris#Sights|the sights of Paris]]");
        assert_eq!(table.count("the sights of Paris", &key("Paris")), 1);
    }

    #[test]
    fn pipe_trick_drops_qualifier() {
        let table = table_from("[[Mercury (planet)|]]");
        assert_eq!(table.count("Mercury", &key("Mercury (planet)")), 1);
    }

    #[test]
    fn pipe_trick_without_qualifier_is_skipped() {
        let table = table_from("[[Paris|]] [[Paris| ]]");
        assert!(table.is_empty());
    }

    #[test]
    fn pipe_trick_ignores_fragment() {
        let table = table_from("[[Paris#History|]] [[Mercury (planet)#Orbit|]]");
        assert_eq!(table.len(), 1);
        assert_eq!(table.count("Mercury", &key("Mercury (planet)")), 1);
    }

    #[test]
    fn label_underscores_read_as_spaces() {
        let table = table_from("[[Paris|City_of_Light]]");
        assert_eq!(table.count("City of Light", &key("Paris")), 1);
        assert_eq!(table.count("City_of_Light", &key("Paris")), 0);
    }

    #[test]
    fn meta_and_interwiki_links_are_ignored() {
        let table = table_from(
            "[[Category:Cities]] [[File:x.png|thumb]] [[:fr:Paris]] [[de:Paris]] [[#Local]]",
        );
        assert!(table.is_empty());
    }

    #[test]
    fn links_across_lines_are_not_joined() {
        let table = table_from("[[Broken\nline]] then [[Paris]]");
        assert_eq!(table.count("Paris", &key("Paris")), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn rows_sorted_by_alias_then_count_desc() {
        let mut table = AliasPriorTable::new();
        table.add("Mercury", key("Mercury (planet)"));
        table.add("Mercury", key("Mercury (element)"));
        table.add("Mercury", key("Mercury (element)"));
        table.add("Apollo", key("Apollo"));
        table.add("Mercury", key("Freddie Mercury"));

        let rows: Vec<_> = table
            .sorted_rows()
            .iter()
            .map(|r| format!("{}|{}|{}", r.alias, r.count, r.entity))
            .collect();
        assert_eq!(
            rows,
            vec![
                "Apollo|1|en_Apollo",
                "Mercury|2|en_Mercury (element)",
                "Mercury|1|en_Freddie Mercury",
                "Mercury|1|en_Mercury (planet)",
            ]
        );
    }

    #[test]
    fn entity_frequencies_sum_over_aliases() {
        let table = table_from("[[Paris]] [[Paris|the capital]] [[Paris|the capital]] [[Lyon]]");
        let freqs: Vec<_> = table
            .entity_frequencies()
            .into_iter()
            .map(|(k, c)| (k.to_string(), c))
            .collect();
        assert_eq!(
            freqs,
            vec![("en_Paris".to_string(), 3), ("en_Lyon".to_string(), 1)]
        );
    }

    #[test]
    fn languages_keep_separate_keys() {
        let mut table = table_from("[[Paris]]");
        collect_links("[[Paris]]", &LanguageCode::new("fr"), &mut table);
        assert_eq!(table.count("Paris", &key("Paris")), 1);
        assert_eq!(
            table.count("Paris", &EntityKey::new(LanguageCode::new("fr"), "Paris")),
            1
        );
    }

    #[test]
    fn page_limit_stops_accumulation() {
        let pages = vec![page("1", "[[A]]"), page("2", "[[B]]")];
        let stats = ArticleStats::new();
        let table = accumulate_pages(pages, &en(), Some(1), AliasPriorTable::new(), &stats);
        assert_eq!(table.len(), 1);
        assert_eq!(stats.pages(), 1);
    }
}
