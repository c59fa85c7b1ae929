use crate::config::{ARTICLE_LOG_INTERVAL, CONTEXT_MIN_WORDS, PROGRESS_INTERVAL};
use crate::content::{is_meta_title, Normalizer, NormalizerConfig};
use crate::index::IdentifierIndex;
use crate::links::link_text;
use crate::models::{GoldRecord, LanguageCode, LinkedSegment, Page};
use crate::parser::WikiReader;
use crate::segment::Segmenter;
use crate::stats::{spinner, ArticleStats};
use crate::writer::{gold_path, GoldWriter};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Settings for one gold extraction pass over a single-language dump.
#[derive(Debug, Clone)]
pub struct GoldConfig {
    pub lang: LanguageCode,
    /// Stop once this many articles have produced records.
    pub article_limit: Option<u64>,
    pub context_min_words: usize,
    pub normalizer: NormalizerConfig,
}

impl GoldConfig {
    pub fn new(lang: LanguageCode) -> Self {
        Self {
            lang,
            article_limit: None,
            context_min_words: CONTEXT_MIN_WORDS,
            normalizer: NormalizerConfig::default(),
        }
    }
}

/// Redirect pages carry a `<redirect>` element or start with `#REDIRECT`.
pub fn is_redirect(page: &Page) -> bool {
    if page.redirect {
        return true;
    }
    page.text.as_deref().is_some_and(|text| {
        text.trim_start()
            .get(..9)
            .is_some_and(|head| head.eq_ignore_ascii_case("#redirect"))
    })
}

/// One record per mention; the context is the mention's segment extended
/// with the following segments until it holds `min_words` words.
pub fn gold_records(
    page: &Page,
    segments: &[LinkedSegment],
    segmenter: &dyn Segmenter,
    min_words: usize,
) -> Vec<GoldRecord> {
    let mut records = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if segment.mentions.is_empty() {
            continue;
        }
        let mut context = segment.text.clone();
        let mut next = i + 1;
        while segmenter.word_count(&context) < min_words && next < segments.len() {
            context.push(' ');
            context.push_str(&segments[next].text);
            next += 1;
        }
        for mention in &segment.mentions {
            records.push(GoldRecord {
                article_id: page.id.clone(),
                article_title: page.title.clone(),
                context: context.clone(),
                entity: mention.entity.clone(),
                mention: mention.surface.clone(),
                start: mention.start,
                end: mention.end,
            });
        }
    }
    records
}

/// Turns pages into gold records against a fixed index.
pub struct GoldExtractor<'a> {
    index: &'a IdentifierIndex,
    segmenter: &'a dyn Segmenter,
    normalizer: Normalizer,
    config: GoldConfig,
}

impl<'a> GoldExtractor<'a> {
    pub fn new(
        index: &'a IdentifierIndex,
        segmenter: &'a dyn Segmenter,
        config: GoldConfig,
    ) -> Result<Self> {
        let normalizer = Normalizer::new(&config.normalizer)?;
        Ok(Self {
            index,
            segmenter,
            normalizer,
            config,
        })
    }

    /// Records for one page. Skipped pages and pages the scanner cannot read
    /// give an empty list; the reason is counted in `stats`.
    pub fn page_records(&self, page: &Page, stats: &ArticleStats) -> Vec<GoldRecord> {
        if is_meta_title(&page.title) {
            stats.inc_meta();
            return Vec::new();
        }
        let Some(raw) = page.text.as_deref() else {
            stats.inc_empty();
            return Vec::new();
        };
        if is_redirect(page) {
            stats.inc_redirects();
            return Vec::new();
        }

        let text = self.normalizer.normalize(raw);
        if text.is_empty() {
            stats.inc_empty();
            return Vec::new();
        }

        let segments = match link_text(
            &text,
            self.config.lang.as_str(),
            self.index,
            self.segmenter,
        ) {
            Ok(segments) => segments,
            Err(e) => {
                let context: String = text.chars().take(120).collect();
                warn!(
                    article_id = %page.id,
                    title = %page.title,
                    error = %e,
                    context = %context,
                    "Link scan failed, skipping article"
                );
                stats.inc_scan_failures();
                return Vec::new();
            }
        };

        let mentions: usize = segments.iter().map(|s| s.mentions.len()).sum();
        stats.add_mentions(mentions as u64);
        gold_records(
            page,
            &segments,
            self.segmenter,
            self.config.context_min_words,
        )
    }

    /// Feeds `pages` through the extractor into `sink`, honouring the article
    /// limit. Returns the number of records produced.
    pub fn run<I, F>(&self, pages: I, stats: &ArticleStats, mut sink: F) -> Result<u64>
    where
        I: IntoIterator<Item = Page>,
        F: FnMut(&GoldRecord) -> Result<()>,
    {
        let pb = spinner(&format!("Extracting {} gold mentions", self.config.lang));
        let mut produced: u64 = 0;
        let mut articles: u64 = 0;

        for page in pages {
            if self
                .config
                .article_limit
                .is_some_and(|limit| articles >= limit)
            {
                info!(limit = articles, "Article limit reached");
                break;
            }
            stats.inc_pages();
            let pages_read = stats.pages();
            if pages_read % PROGRESS_INTERVAL == 0 {
                pb.set_position(pages_read);
            }
            if pages_read % ARTICLE_LOG_INTERVAL == 0 {
                info!(
                    pages = pages_read,
                    articles = stats.articles(),
                    records = produced,
                    "Extracting gold mentions"
                );
            }

            let records = self.page_records(&page, stats);
            if records.is_empty() {
                continue;
            }
            for record in &records {
                sink(record)?;
            }
            produced += records.len() as u64;
            articles += 1;
            stats.add_records(records.len() as u64);
            stats.inc_articles();
        }

        pb.finish_and_clear();
        Ok(produced)
    }
}

/// Streams one article dump into `gold_entities_<lang>.jsonl` under `output_dir`.
pub fn run_extraction(
    path: &str,
    output_dir: &str,
    index: &IdentifierIndex,
    segmenter: &dyn Segmenter,
    config: GoldConfig,
    stats: &ArticleStats,
) -> Result<u64> {
    let reader = WikiReader::open(path)
        .with_context(|| format!("Failed to open article dump at: {}", path))?;
    let out = gold_path(output_dir, &config.lang);
    info!(path, output = ?out, lang = %config.lang, "Extracting gold mentions");

    let mut writer = GoldWriter::create(out)?;
    let extractor = GoldExtractor::new(index, segmenter, config)?;
    extractor.run(reader, stats, |record| writer.write(record))?;
    let written = writer.finish()?;

    info!(
        pages = stats.pages(),
        articles = stats.articles(),
        records = written,
        "Gold extraction complete"
    );
    Ok(written)
}
