use crate::config::{
    ENTITY_ALIAS_FILE, ENTITY_DEFS_FILE, ENTITY_DESCR_FILE, ENTITY_FREQ_FILE,
    ENTITY_PROPERTIES_FILE, PRIOR_PROB_FILE, TABLE_DELIMITER, WRITER_BUFFER_SIZE,
};
use crate::entities::{AliasTable, DescriptionTable, EntityTables, PropertyTable};
use crate::index::IdentifierIndex;
use crate::models::{EntityId, GoldRecord, LanguageCode};
use crate::priors::AliasPriorTable;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer, WriterBuilder};
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn output_path(output_dir: &str, file_name: &str) -> PathBuf {
    Path::new(output_dir).join(file_name)
}

pub fn gold_path(output_dir: &str, lang: &LanguageCode) -> PathBuf {
    output_path(output_dir, &format!("gold_entities_{}.jsonl", lang))
}

fn table_writer(path: &Path, header: &[&str]) -> Result<Writer<BufWriter<File>>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create table: {:?}", path))?;
    let mut writer = WriterBuilder::new()
        .delimiter(TABLE_DELIMITER)
        .from_writer(BufWriter::with_capacity(WRITER_BUFFER_SIZE, file));
    writer
        .write_record(header)
        .with_context(|| format!("Failed to write header of {:?}", path))?;
    Ok(writer)
}

fn sorted_ids<V>(table: &FxHashMap<EntityId, V>) -> Vec<&EntityId> {
    let mut ids: Vec<&EntityId> = table.keys().collect();
    ids.sort_unstable();
    ids
}

/// Writes the four entity tables into `output_dir`.
pub fn write_entity_tables(tables: &EntityTables, output_dir: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;
    write_entity_defs(&tables.index, &output_path(output_dir, ENTITY_DEFS_FILE))?;
    write_aliases(&tables.aliases, &output_path(output_dir, ENTITY_ALIAS_FILE))?;
    write_descriptions(
        &tables.descriptions,
        &output_path(output_dir, ENTITY_DESCR_FILE),
    )?;
    write_properties(
        &tables.properties,
        &output_path(output_dir, ENTITY_PROPERTIES_FILE),
    )?;
    info!(output_dir, "Entity tables written");
    Ok(())
}

pub fn write_entity_defs(index: &IdentifierIndex, path: &Path) -> Result<()> {
    let mut writer = table_writer(path, &["lang", "title", "entity"])?;
    for (lang, title, id) in index.sorted_entries() {
        writer.write_record([lang.as_str(), title, id.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads `entity_defs.csv` back into an index.
pub fn read_entity_defs(path: &Path) -> Result<IdentifierIndex> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut reader = ReaderBuilder::new()
        .delimiter(TABLE_DELIMITER)
        .from_reader(BufReader::with_capacity(256 * 1024, file));

    let mut index = IdentifierIndex::new();
    for result in reader.records() {
        let record = result.with_context(|| format!("Malformed row in {:?}", path))?;
        let (Some(lang), Some(title), Some(id)) = (record.get(0), record.get(1), record.get(2))
        else {
            continue;
        };
        index.insert(&LanguageCode::new(lang), title, EntityId::new(id));
    }
    info!(
        titles = index.len(),
        languages = index.languages(),
        "Title table read"
    );
    Ok(index)
}

pub fn write_aliases(aliases: &AliasTable, path: &Path) -> Result<()> {
    let mut writer = table_writer(path, &["entity", "lang", "alias"])?;
    for id in sorted_ids(aliases) {
        let mut by_lang: Vec<_> = aliases[id].iter().collect();
        by_lang.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (lang, values) in by_lang {
            for alias in values {
                writer.write_record([id.as_str(), lang.as_str(), alias.as_str()])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_descriptions(descriptions: &DescriptionTable, path: &Path) -> Result<()> {
    let mut writer = table_writer(path, &["entity", "lang", "description"])?;
    for id in sorted_ids(descriptions) {
        let mut by_lang: Vec<_> = descriptions[id].iter().collect();
        by_lang.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (lang, description) in by_lang {
            writer.write_record([id.as_str(), lang.as_str(), description.as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_properties(properties: &PropertyTable, path: &Path) -> Result<()> {
    let mut writer = table_writer(path, &["entity", "property", "targets"])?;
    for id in sorted_ids(properties) {
        for (property, targets) in &properties[id] {
            let joined = targets
                .iter()
                .map(EntityId::as_str)
                .collect::<Vec<_>>()
                .join(",");
            writer.write_record([id.as_str(), property.as_str(), joined.as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes `prior_prob.csv` and the derived `entity_freq.csv`.
pub fn write_priors(table: &AliasPriorTable, output_dir: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    let path = output_path(output_dir, PRIOR_PROB_FILE);
    let mut writer = table_writer(&path, &["alias", "count", "entity"])?;
    let rows = table.sorted_rows();
    for row in &rows {
        let count = row.count.to_string();
        let entity = row.entity.to_string();
        writer.write_record([row.alias, count.as_str(), entity.as_str()])?;
    }
    writer.flush()?;

    let path = output_path(output_dir, ENTITY_FREQ_FILE);
    let mut writer = table_writer(&path, &["entity", "count"])?;
    let frequencies = table.entity_frequencies();
    for (entity, count) in &frequencies {
        writer.write_record([entity.to_string(), count.to_string()])?;
    }
    writer.flush()?;

    info!(
        rows = rows.len(),
        entities = frequencies.len(),
        "Prior tables written"
    );
    Ok(())
}

/// Line-delimited JSON sink for gold mentions.
pub struct GoldWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl GoldWriter {
    pub fn create(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        Ok(Self {
            writer: BufWriter::with_capacity(WRITER_BUFFER_SIZE, file),
            path,
            written: 0,
        })
    }

    pub fn write(&mut self, record: &GoldRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)
            .with_context(|| format!("Failed to write record to {:?}", self.path))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {:?}", self.path))?;
        Ok(self.written)
    }
}
