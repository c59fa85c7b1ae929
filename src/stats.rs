use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Spinner shown while a dump is streamed.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} ({pos})") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(msg.to_string());
    pb
}

/// Counters for the entity dump pass
#[derive(Default)]
pub struct EntityStats {
    pub lines_read: AtomicU64,
    pub malformed_lines: AtomicU64,
    pub records_skipped: AtomicU64,
    pub records_excluded: AtomicU64,
    pub records_kept: AtomicU64,
    pub title_overwrites: AtomicU64,
}

impl EntityStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_lines(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_excluded(&self) {
        self.records_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_kept(&self) {
        self.records_kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_title_overwrites(&self) {
        self.title_overwrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed_lines.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    pub fn excluded(&self) -> u64 {
        self.records_excluded.load(Ordering::Relaxed)
    }

    pub fn kept(&self) -> u64 {
        self.records_kept.load(Ordering::Relaxed)
    }

    pub fn title_overwrites(&self) -> u64 {
        self.title_overwrites.load(Ordering::Relaxed)
    }
}

/// Counters shared by the article passes (priors and gold extraction)
#[derive(Default)]
pub struct ArticleStats {
    pub pages_read: AtomicU64,
    pub articles_processed: AtomicU64,
    pub meta_pages: AtomicU64,
    pub redirects: AtomicU64,
    pub empty_pages: AtomicU64,
    pub scan_failures: AtomicU64,
    pub links_found: AtomicU64,
    pub mentions_found: AtomicU64,
    pub records_written: AtomicU64,
}

impl ArticleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages(&self) {
        self.pages_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_articles(&self) {
        self.articles_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_meta(&self) {
        self.meta_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects(&self) {
        self.redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_empty(&self) {
        self.empty_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_scan_failures(&self) {
        self.scan_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_links(&self, count: u64) {
        self.links_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_mentions(&self, count: u64) {
        self.mentions_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records(&self, count: u64) {
        self.records_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn pages(&self) -> u64 {
        self.pages_read.load(Ordering::Relaxed)
    }

    pub fn articles(&self) -> u64 {
        self.articles_processed.load(Ordering::Relaxed)
    }

    pub fn meta(&self) -> u64 {
        self.meta_pages.load(Ordering::Relaxed)
    }

    pub fn redirect_pages(&self) -> u64 {
        self.redirects.load(Ordering::Relaxed)
    }

    pub fn empty(&self) -> u64 {
        self.empty_pages.load(Ordering::Relaxed)
    }

    pub fn scan_failed(&self) -> u64 {
        self.scan_failures.load(Ordering::Relaxed)
    }

    pub fn links(&self) -> u64 {
        self.links_found.load(Ordering::Relaxed)
    }

    pub fn mentions(&self) -> u64 {
        self.mentions_found.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }
}
