//! Ariadne: entity-linked corpora from Wikidata and Wikipedia dumps
//!
//! This crate turns two kinds of public dumps into training data for entity linking:
//!
//! 1. **Entity Pass** -- Stream the Wikidata JSON dump, drop records that are instances
//!    or subclasses of excluded items, and write per-language title, alias, description
//!    and property tables
//! 2. **Prior Pass** -- Stream one or more Wikipedia XML dumps and count how often each
//!    anchor text links to each article, giving alias priors and entity frequencies
//! 3. **Gold Pass** -- Normalize every article's markup to plain text, resolve its
//!    internal links through the title index, and write one JSON line per mention with
//!    its context and character offsets
//!
//! # Architecture
//!
//! - **Streaming input** -- Dumps are read line by line (JSON) or event by event (XML),
//!   decompressing BZ2 on the fly; nothing holds a whole dump in memory
//! - **Character-level link scanner** -- A small state machine replaces link markup with
//!   its surface text and records mention offsets, counted in characters
//! - **Pluggable segmentation** -- Sentence splitting sits behind the [`segment::Segmenter`] trait
//! - **Index caching** -- The title index is snapshotted with bincode and reused while
//!   the title table is unchanged
//!
//! # Key Modules
//!
//! - [`entities`] -- Entity dump filter producing the four entity tables
//! - [`index`] -- `(language, title) -> entity` lookup with first-letter case fallback
//! - [`parser`] -- Streaming XML page reader with BZ2 decompression
//! - [`content`] -- Markup normalizer (templates, tables, tags, entities, whitespace)
//! - [`links`] -- Link scanner and mention resolution
//! - [`segment`] -- Sentence segmentation
//! - [`priors`] -- Alias/entity link counting
//! - [`extract`] -- Gold mention extraction
//! - [`writer`] -- Delimited tables and the JSON Lines corpus
//! - [`cache`] -- Index persistence
//! - [`stats`] -- Atomic counters and progress spinners
//! - [`models`] -- Core data types (Page, Mention, GoldRecord)
//! - [`config`] -- Constants, namespaces and markup tables
//!
//! # Example Usage
//!
//! ```bash
//! ariadne entities -i latest-all.json.bz2 -o output/ --languages en,fr
//! ariadne priors -i enwiki-latest-pages-articles.xml.bz2 frwiki-latest-pages-articles.xml.bz2 -o output/
//! ariadne gold -i enwiki-latest-pages-articles.xml.bz2 -o output/ --limit 10000
//! ```

pub mod cache;
pub mod config;
pub mod content;
pub mod entities;
pub mod extract;
pub mod index;
pub mod links;
pub mod models;
pub mod parser;
pub mod priors;
pub mod segment;
pub mod stats;
pub mod writer;
