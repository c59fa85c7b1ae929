//! End-to-end tests for the Ariadne pipeline.
//!
//! Each test starts from BZ2-compressed fixtures written to a fresh TempDir:
//!
//! - **Entity dump** -- a JSON array with one record per line, as Wikidata ships it
//! - **Article dump** -- a MediaWiki XML export named like `enwiki-...xml.bz2` so the
//!   language can be inferred from the file name
//!
//! The sample data holds two real entities (Paris, France), one record excluded for
//! being an instance of a Wikimedia category item, a property, a record without
//! descriptions and one malformed line. The article dump holds two articles, a
//! redirect and a category page.

use ariadne::cache;
use ariadne::config::{
    ENTITY_ALIAS_FILE, ENTITY_DEFS_FILE, ENTITY_DESCR_FILE, ENTITY_FREQ_FILE,
    ENTITY_PROPERTIES_FILE, PRIOR_PROB_FILE,
};
use ariadne::entities::{EntityFilter, EntityTables};
use ariadne::extract::{run_extraction, GoldConfig};
use ariadne::models::{EntityId, GoldRecord, LanguageCode};
use ariadne::parser::WikiReader;
use ariadne::priors::{accumulate_dump, AliasPriorTable};
use ariadne::segment::SentenceSplitter;
use ariadne::stats::{ArticleStats, EntityStats};
use ariadne::writer::{output_path, read_entity_defs, write_entity_tables, write_priors};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper: BZ2-compress `content` into `dir/name` and return the path.
fn create_bz2(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(content.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let path = dir.path().join(name);
    fs::write(&path, compressed).unwrap();
    path
}

fn sample_entities() -> &'static str {
    r#"[
{"type":"item","id":"Q90","claims":{"P17":[{"mainsnak":{"datavalue":{"value":{"entity-type":"item","numeric-id":142,"id":"Q142"},"type":"wikibase-entityid"}},"rank":"normal"}]},"sitelinks":{"enwiki":{"site":"enwiki","title":"Paris"},"dewiki":{"site":"dewiki","title":"Paris"}},"descriptions":{"en":{"language":"en","value":"capital of France"}},"aliases":{"en":[{"language":"en","value":"City of Light"}]}},
{"type":"item","id":"Q142","claims":{"P36":[{"mainsnak":{"datavalue":{"value":{"entity-type":"item","numeric-id":90,"id":"Q90"},"type":"wikibase-entityid"}},"rank":"normal"}]},"sitelinks":{"enwiki":{"site":"enwiki","title":"France"}},"descriptions":{"en":{"language":"en","value":"country in Western Europe"}},"aliases":[]},
{"type":"item","id":"Q7","claims":{"P31":[{"mainsnak":{"datavalue":{"value":{"entity-type":"item","numeric-id":4167836,"id":"Q4167836"},"type":"wikibase-entityid"}},"rank":"normal"}]},"sitelinks":{"enwiki":{"site":"enwiki","title":"Category:Capitals"}},"descriptions":{"en":{"language":"en","value":"Wikimedia category"}}},
{"type":"property","id":"P17","descriptions":{"en":{"language":"en","value":"sovereign state of this item"}}},
{"type":"item","id":"Q8","sitelinks":{"enwiki":{"site":"enwiki","title":"Nowhere"}},"descriptions":{}},
{"type":"item","id":
]
"#
}

fn sample_xml() -> &'static str {
    r#"<mediawiki>
        <page>
            <title>Paris</title>
            <ns>0</ns>
            <id>1</id>
            <revision>
                <id>100</id>
                <text>'''Paris''' is the capital of [[France]]. It is known as the [[Paris|City of Light]].

[[Category:Capitals]]</text>
            </revision>
        </page>
        <page>
            <title>France</title>
            <ns>0</ns>
            <id>2</id>
            <revision>
                <id>200</id>
                <text>{{Infobox country
| name = France
}}
'''France''' is a country. Its capital is [[paris]].</text>
            </revision>
        </page>
        <page>
            <title>Lutetia</title>
            <ns>0</ns>
            <id>3</id>
            <redirect title="Paris" />
            <revision>
                <id>300</id>
                <text>#REDIRECT [[Paris]]</text>
            </revision>
        </page>
        <page>
            <title>Category:Capitals</title>
            <ns>14</ns>
            <id>4</id>
            <revision>
                <id>400</id>
                <text>Capital cities such as [[Paris]].</text>
            </revision>
        </page>
    </mediawiki>"#
}

const ARTICLE_DUMP: &str = "enwiki-20240101-pages-articles.xml.bz2";

fn build_entity_tables(dir: &TempDir) -> (EntityTables, EntityStats) {
    let input = create_bz2(dir, "latest-all.json.bz2", sample_entities());
    let filter = EntityFilter::default();
    let stats = EntityStats::new();
    let tables = EntityTables::build(input.to_str().unwrap(), &filter, &stats).unwrap();
    (tables, stats)
}

fn read_gold(path: &PathBuf) -> Vec<GoldRecord> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Entity pass
// ---------------------------------------------------------------------------

#[test]
fn entity_pass_counts_every_kind_of_line() {
    let dir = TempDir::new().unwrap();
    let (tables, stats) = build_entity_tables(&dir);

    assert_eq!(stats.kept(), 2);
    assert_eq!(stats.excluded(), 1);
    assert_eq!(stats.skipped(), 2); // property + item without descriptions
    assert_eq!(stats.malformed(), 1);
    assert_eq!(tables.index.len(), 3); // en Paris, en France, de Paris
}

#[test]
fn entity_pass_writes_all_tables() {
    let dir = TempDir::new().unwrap();
    let (tables, _) = build_entity_tables(&dir);
    let out = dir.path().join("out");
    let out_str = out.to_str().unwrap();
    write_entity_tables(&tables, out_str).unwrap();

    let defs = fs::read_to_string(output_path(out_str, ENTITY_DEFS_FILE)).unwrap();
    assert_eq!(
        defs,
        "lang|title|entity\nde|Paris|Q90\nen|France|Q142\nen|Paris|Q90\n"
    );

    let aliases = fs::read_to_string(output_path(out_str, ENTITY_ALIAS_FILE)).unwrap();
    assert_eq!(aliases, "entity|lang|alias\nQ90|en|City of Light\n");

    let descriptions = fs::read_to_string(output_path(out_str, ENTITY_DESCR_FILE)).unwrap();
    assert_eq!(
        descriptions,
        "entity|lang|description\nQ142|en|country in Western Europe\nQ90|en|capital of France\n"
    );

    let properties = fs::read_to_string(output_path(out_str, ENTITY_PROPERTIES_FILE)).unwrap();
    assert_eq!(
        properties,
        "entity|property|targets\nQ142|P36|Q90\nQ90|P17|Q142\n"
    );
}

#[test]
fn excluded_record_never_reaches_the_index() {
    let dir = TempDir::new().unwrap();
    let (tables, _) = build_entity_tables(&dir);
    assert_eq!(tables.index.resolve("en", "Category:Capitals"), None);
    assert_eq!(tables.index.resolve("en", "Nowhere"), None);
}

// ---------------------------------------------------------------------------
// Article stream
// ---------------------------------------------------------------------------

#[test]
fn reader_yields_pages_in_order() {
    let dir = TempDir::new().unwrap();
    let input = create_bz2(&dir, ARTICLE_DUMP, sample_xml());
    let pages: Vec<_> = WikiReader::open(input.to_str().unwrap()).unwrap().collect();

    let titles: Vec<_> = pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Paris", "France", "Lutetia", "Category:Capitals"]
    );
    assert_eq!(pages[1].id, "2");
    assert!(pages[2].redirect);
    assert!(!pages[0].redirect);
}

#[test]
fn dump_name_gives_language() {
    let dir = TempDir::new().unwrap();
    let input = create_bz2(&dir, ARTICLE_DUMP, sample_xml());
    assert_eq!(
        LanguageCode::from_dump_path(&input),
        Some(LanguageCode::new("en"))
    );
}

// ---------------------------------------------------------------------------
// Prior pass
// ---------------------------------------------------------------------------

#[test]
fn prior_pass_writes_sorted_tables() {
    let dir = TempDir::new().unwrap();
    let input = create_bz2(&dir, ARTICLE_DUMP, sample_xml());
    let out = dir.path().join("out");
    let out_str = out.to_str().unwrap();

    let stats = ArticleStats::new();
    let table = accumulate_dump(
        input.to_str().unwrap(),
        &LanguageCode::new("en"),
        None,
        AliasPriorTable::new(),
        &stats,
    )
    .unwrap();
    write_priors(&table, out_str).unwrap();

    assert_eq!(stats.pages(), 4);
    assert_eq!(stats.links(), 5);

    let priors = fs::read_to_string(output_path(out_str, PRIOR_PROB_FILE)).unwrap();
    assert_eq!(
        priors,
        "alias|count|entity\n\
         City of Light|1|en_Paris\n\
         France|1|en_France\n\
         Paris|2|en_Paris\n\
         paris|1|en_Paris\n"
    );

    let freqs = fs::read_to_string(output_path(out_str, ENTITY_FREQ_FILE)).unwrap();
    assert_eq!(freqs, "entity|count\nen_Paris|4\nen_France|1\n");
}

#[test]
fn prior_pass_accumulates_across_dumps() {
    let dir = TempDir::new().unwrap();
    let first = create_bz2(&dir, ARTICLE_DUMP, sample_xml());
    let second = create_bz2(&dir, "enwiki-20240201-pages-articles.xml.bz2", sample_xml());
    let en = LanguageCode::new("en");
    let stats = ArticleStats::new();

    let table = accumulate_dump(
        first.to_str().unwrap(),
        &en,
        None,
        AliasPriorTable::new(),
        &stats,
    )
    .unwrap();
    let table = accumulate_dump(second.to_str().unwrap(), &en, None, table, &stats).unwrap();

    assert_eq!(stats.pages(), 8);
    assert_eq!(table.len(), 4);
}

// ---------------------------------------------------------------------------
// Gold pass
// ---------------------------------------------------------------------------

fn run_gold(dir: &TempDir, limit: Option<u64>) -> (Vec<GoldRecord>, ArticleStats) {
    let (tables, _) = build_entity_tables(dir);
    let input = create_bz2(dir, ARTICLE_DUMP, sample_xml());
    let out = dir.path().join("out");
    let out_str = out.to_str().unwrap();

    let mut config = GoldConfig::new(LanguageCode::new("en"));
    config.context_min_words = 1;
    config.article_limit = limit;
    let stats = ArticleStats::new();
    let written = run_extraction(
        input.to_str().unwrap(),
        out_str,
        &tables.index,
        &SentenceSplitter,
        config,
        &stats,
    )
    .unwrap();

    let records = read_gold(&out.join("gold_entities_en.jsonl"));
    assert_eq!(written, records.len() as u64);
    assert_eq!(stats.records(), written);
    (records, stats)
}

#[test]
fn gold_pass_resolves_mentions_with_offsets() {
    let dir = TempDir::new().unwrap();
    let (records, _) = run_gold(&dir, None);

    assert_eq!(records.len(), 3);

    assert_eq!(records[0].article_id, "1");
    assert_eq!(records[0].article_title, "Paris");
    assert_eq!(records[0].context, "Paris is the capital of France.");
    assert_eq!(records[0].mention, "France");
    assert_eq!(records[0].entity, EntityId::new("Q142"));
    assert_eq!((records[0].start, records[0].end), (24, 30));

    assert_eq!(records[1].context, "It is known as the City of Light.");
    assert_eq!(records[1].mention, "City of Light");
    assert_eq!(records[1].entity, EntityId::new("Q90"));
    assert_eq!((records[1].start, records[1].end), (19, 32));

    assert_eq!(records[2].article_title, "France");
    assert_eq!(records[2].context, "Its capital is paris.");
    assert_eq!(records[2].mention, "paris");
    assert_eq!(records[2].entity, EntityId::new("Q90"));
    assert_eq!((records[2].start, records[2].end), (15, 20));
}

#[test]
fn gold_offsets_select_the_mention() {
    let dir = TempDir::new().unwrap();
    let (records, _) = run_gold(&dir, None);
    for record in &records {
        let surface: String = record
            .context
            .chars()
            .skip(record.start)
            .take(record.end - record.start)
            .collect();
        assert_eq!(surface, record.mention);
    }
}

#[test]
fn gold_pass_skips_redirects_and_meta_pages() {
    let dir = TempDir::new().unwrap();
    let (records, stats) = run_gold(&dir, None);

    assert!(records.iter().all(|r| r.article_id == "1" || r.article_id == "2"));
    assert_eq!(stats.pages(), 4);
    assert_eq!(stats.articles(), 2);
    assert_eq!(stats.redirect_pages(), 1);
    assert_eq!(stats.meta(), 1);
    assert_eq!(stats.mentions(), 3);
}

#[test]
fn gold_pass_honours_article_limit() {
    let dir = TempDir::new().unwrap();
    let (records, stats) = run_gold(&dir, Some(1));
    assert_eq!(records.len(), 2);
    assert_eq!(stats.articles(), 1);
}

// ---------------------------------------------------------------------------
// Title table and cache
// ---------------------------------------------------------------------------

#[test]
fn title_table_round_trips_through_cache() {
    let dir = TempDir::new().unwrap();
    let (tables, _) = build_entity_tables(&dir);
    let out = dir.path().join("out");
    let out_str = out.to_str().unwrap();
    write_entity_tables(&tables, out_str).unwrap();

    let defs_path = output_path(out_str, ENTITY_DEFS_FILE);
    let defs = defs_path.to_str().unwrap();
    let cache_path = cache::cache_path(out_str);
    assert!(cache::try_load_index(&cache_path, defs).unwrap().is_none());

    let index = read_entity_defs(&defs_path).unwrap();
    cache::save_index(&index, defs, out_str).unwrap();

    let cached = cache::try_load_index(&cache_path, defs).unwrap().unwrap();
    assert_eq!(cached.len(), 3);
    assert_eq!(cached.resolve("en", "France"), Some(&EntityId::new("Q142")));
    assert_eq!(cached.resolve("en", "paris"), Some(&EntityId::new("Q90")));
}
