use anyhow::{bail, Context, Result};
use ariadne::cache;
use ariadne::config::{CONTEXT_MIN_WORDS, ENTITY_DEFS_FILE};
use ariadne::entities::{EntityFilter, EntityTables};
use ariadne::extract::{run_extraction, GoldConfig};
use ariadne::index::IdentifierIndex;
use ariadne::models::LanguageCode;
use ariadne::priors::{accumulate_dump, AliasPriorTable};
use ariadne::segment::SentenceSplitter;
use ariadne::stats::{ArticleStats, EntityStats};
use ariadne::writer::{output_path, read_entity_defs, write_entity_tables, write_priors};
use clap::{Args, Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(about = "Entity-linked corpora from Wikidata and Wikipedia dumps")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter the Wikidata JSON dump into title, alias, description and property tables
    Entities(EntitiesArgs),
    /// Count alias/entity link pairs across Wikipedia dumps
    Priors(PriorsArgs),
    /// Write entity-annotated contexts from a Wikipedia dump
    Gold(GoldArgs),
}

#[derive(Args)]
struct EntitiesArgs {
    /// Path to the Wikidata JSON dump (.json or .json.bz2)
    #[arg(short, long)]
    input: String,

    /// Output directory for the entity tables
    #[arg(short, long)]
    output: String,

    /// Languages to keep (comma-separated, defaults to the built-in set)
    #[arg(long, value_delimiter = ',')]
    languages: Vec<String>,

    /// Extra item ids whose instances and subclasses are dropped
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Limit number of dump lines to read (for testing)
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct PriorsArgs {
    /// Wikipedia dumps (.xml or .xml.bz2); repeat for several languages
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<String>,

    /// Output directory for prior_prob.csv and entity_freq.csv
    #[arg(short, long)]
    output: String,

    /// Language of every input (inferred from file names like `enwiki-...` otherwise)
    #[arg(long)]
    lang: Option<String>,

    /// Limit number of pages read per dump (for testing)
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct GoldArgs {
    /// Wikipedia dumps (.xml or .xml.bz2); one output file per language
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<String>,

    /// Directory holding entity_defs.csv; gold files are written here too
    #[arg(short, long)]
    output: String,

    /// Language of every input (inferred from file names like `enwiki-...` otherwise)
    #[arg(long)]
    lang: Option<String>,

    /// Stop each dump after this many articles produced mentions
    #[arg(long)]
    limit: Option<u64>,

    /// Minimum number of words in a mention context
    #[arg(long, default_value_t = CONTEXT_MIN_WORDS)]
    context_words: usize,

    /// Force re-reading entity_defs.csv instead of the index cache
    #[arg(long)]
    no_cache: bool,
}

fn dump_language(path: &str, explicit: Option<&str>) -> Result<LanguageCode> {
    if let Some(code) = explicit {
        return Ok(LanguageCode::new(code));
    }
    match LanguageCode::from_dump_path(Path::new(path)) {
        Some(lang) => Ok(lang),
        None => bail!(
            "Cannot infer the language of {}; pass --lang or use a name like enwiki-latest-pages-articles.xml.bz2",
            path
        ),
    }
}

fn run_entities(args: EntitiesArgs) -> Result<()> {
    let filter = EntityFilter::default()
        .with_languages(args.languages.into_iter().map(LanguageCode::new).collect())
        .exclude(args.exclude)
        .with_limit(args.limit);

    let start = Instant::now();
    let stats = EntityStats::new();
    let tables = EntityTables::build(&args.input, &filter, &stats)?;
    write_entity_tables(&tables, &args.output)?;
    let duration = start.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", duration.as_secs_f64());
    println!();
    println!("Lines read:         {}", stats.lines());
    println!("Malformed lines:    {}", stats.malformed());
    println!("Records skipped:    {}", stats.skipped());
    println!("Records excluded:   {}", stats.excluded());
    println!("Records kept:       {}", stats.kept());
    println!("Titles indexed:     {}", tables.index.len());
    println!("Title overwrites:   {}", stats.title_overwrites());
    println!("Entities w/ alias:  {}", tables.aliases.len());
    println!("Entities w/ descr:  {}", tables.descriptions.len());

    Ok(())
}

fn run_priors(args: PriorsArgs) -> Result<()> {
    let start = Instant::now();
    let stats = ArticleStats::new();
    let mut table = AliasPriorTable::new();

    for input in &args.input {
        let lang = dump_language(input, args.lang.as_deref())?;
        table = accumulate_dump(input, &lang, args.limit, table, &stats)?;
    }
    write_priors(&table, &args.output)?;
    let duration = start.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", duration.as_secs_f64());
    println!();
    println!("Pages read:         {}", stats.pages());
    println!("Pages with links:   {}", stats.articles());
    println!("Links counted:      {}", stats.links());
    println!("Distinct aliases:   {}", table.len());

    Ok(())
}

/// Loads the title index for the gold pass, preferring the binary cache.
fn load_title_index(output_dir: &str, no_cache: bool) -> Result<IdentifierIndex> {
    let defs_path = output_path(output_dir, ENTITY_DEFS_FILE);
    if !defs_path.exists() {
        bail!(
            "Title table not found at {:?}; run `ariadne entities` with the same output directory first",
            defs_path
        );
    }
    let defs = defs_path
        .to_str()
        .context("Title table path is not valid UTF-8")?;
    let cache_path = cache::cache_path(output_dir);

    if !no_cache {
        if let Some(index) = cache::try_load_index(&cache_path, defs)? {
            return Ok(index);
        }
        info!("Reading title table (cache miss or invalid)");
    } else {
        info!("Cache disabled, reading title table");
    }

    let index = read_entity_defs(&defs_path)?;
    if let Err(e) = cache::save_index(&index, defs, output_dir) {
        warn!(error = %e, "Failed to save index cache");
    }
    Ok(index)
}

fn run_gold(args: GoldArgs) -> Result<()> {
    let start_indexing = Instant::now();
    let index = load_title_index(&args.output, args.no_cache)?;
    let indexing_duration = start_indexing.elapsed();
    info!(
        duration_secs = indexing_duration.as_secs_f64(),
        titles = index.len(),
        "Index ready"
    );

    let start_extracting = Instant::now();
    let stats = ArticleStats::new();
    for input in &args.input {
        let lang = dump_language(input, args.lang.as_deref())?;
        let mut config = GoldConfig::new(lang);
        config.article_limit = args.limit;
        config.context_min_words = args.context_words;
        run_extraction(
            input,
            &args.output,
            &index,
            &SentenceSplitter,
            config,
            &stats,
        )?;
    }
    let extraction_duration = start_extracting.elapsed();

    println!();
    println!("=== Summary ===");
    println!(
        "Indexing time:      {:.2}s",
        indexing_duration.as_secs_f64()
    );
    println!(
        "Extraction time:    {:.2}s",
        extraction_duration.as_secs_f64()
    );
    println!(
        "Total time:         {:.2}s",
        (indexing_duration + extraction_duration).as_secs_f64()
    );
    println!();
    println!("Pages read:         {}", stats.pages());
    println!("Articles w/ output: {}", stats.articles());
    println!("Meta pages:         {}", stats.meta());
    println!("Redirects:          {}", stats.redirect_pages());
    println!("Empty pages:        {}", stats.empty());
    println!("Scan failures:      {}", stats.scan_failed());
    println!("Mentions found:     {}", stats.mentions());
    println!("Records written:    {}", stats.records());

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Entities(args) => run_entities(args),
        Commands::Priors(args) => run_priors(args),
        Commands::Gold(args) => run_gold(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
