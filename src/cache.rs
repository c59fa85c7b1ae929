use crate::config::{CACHE_VERSION, INDEX_CACHE_FILE};
use crate::index::IdentifierIndex;
use crate::models::{EntityId, LanguageCode};
use anyhow::{Context, Result};
use bincode::Options;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

type TitleMaps = FxHashMap<LanguageCode, FxHashMap<String, EntityId>>;

#[derive(Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    /// The title table the snapshot was built from.
    pub input_path: String,
    pub input_mtime: u64,
    pub input_size: u64,
    pub title_count: usize,
    pub language_count: usize,
}

#[derive(Deserialize)]
struct IndexCacheDe {
    metadata: CacheMetadata,
    titles: TitleMaps,
}

/// Borrows the title maps so millions of titles are not cloned to serialize.
#[derive(Serialize)]
struct IndexCacheSer<'a> {
    metadata: CacheMetadata,
    titles: &'a TitleMaps,
}

pub fn cache_path(output_dir: &str) -> PathBuf {
    Path::new(output_dir).join(INDEX_CACHE_FILE)
}

fn get_input_metadata(input_path: &str) -> Result<(u64, u64)> {
    let metadata = fs::metadata(input_path)
        .with_context(|| format!("Failed to get metadata for: {}", input_path))?;
    let mtime = metadata
        .modified()
        .context("Failed to get modification time")?
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("Invalid modification time")?
        .as_secs();
    let size = metadata.len();
    Ok((mtime, size))
}

fn read_cache(cache_path: &Path) -> Result<IndexCacheDe> {
    let file_size = fs::metadata(cache_path).map(|m| m.len()).unwrap_or(0);
    let file = File::open(cache_path)
        .with_context(|| format!("Failed to open cache file: {:?}", cache_path))?;
    let reader = BufReader::with_capacity(256 * 1024, file);
    let options = bincode::options().with_limit(file_size.saturating_add(1024));
    options
        .deserialize_from(reader)
        .context("Failed to deserialize index cache")
}

/// Returns `Ok(Some(index))` if the cache matches `input_path`, `Ok(None)` if
/// it is missing, stale or unreadable.
pub fn try_load_index(cache_path: &Path, input_path: &str) -> Result<Option<IdentifierIndex>> {
    if !cache_path.exists() {
        return Ok(None);
    }

    let cache = match read_cache(cache_path) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Cache file is corrupt or unreadable");
            return Ok(None);
        }
    };

    if cache.metadata.version != CACHE_VERSION {
        info!(
            cached = cache.metadata.version,
            current = CACHE_VERSION,
            "Cache version mismatch"
        );
        return Ok(None);
    }

    if cache.metadata.input_path != input_path {
        info!(
            cached = cache.metadata.input_path,
            current = input_path,
            "Cache input path mismatch"
        );
        return Ok(None);
    }

    let (mtime, size) = get_input_metadata(input_path)?;
    if cache.metadata.input_mtime != mtime || cache.metadata.input_size != size {
        info!(
            cached_mtime = cache.metadata.input_mtime,
            current_mtime = mtime,
            cached_size = cache.metadata.input_size,
            current_size = size,
            "Title table has changed since cache was created"
        );
        return Ok(None);
    }

    info!(
        titles = cache.metadata.title_count,
        languages = cache.metadata.language_count,
        "Index loaded from cache"
    );

    Ok(Some(IdentifierIndex::from_maps(cache.titles)))
}

/// Serializes the index by reference and writes atomically via rename.
pub fn save_index(index: &IdentifierIndex, input_path: &str, output_dir: &str) -> Result<()> {
    let path = cache_path(output_dir);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let (mtime, size) = get_input_metadata(input_path)?;
    let cache = IndexCacheSer {
        metadata: CacheMetadata {
            version: CACHE_VERSION,
            input_path: input_path.to_string(),
            input_mtime: mtime,
            input_size: size,
            title_count: index.len(),
            language_count: index.languages(),
        },
        titles: index.maps(),
    };

    let tmp_path = path.with_extension("cache.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp cache file: {:?}", tmp_path))?;
    let writer = BufWriter::new(file);

    bincode::DefaultOptions::new()
        .serialize_into(writer, &cache)
        .context("Failed to serialize index cache")?;

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to rename temp cache file to: {:?}", path))?;

    info!(titles = index.len(), path = ?path, "Index cache saved");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_input(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("entity_defs.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "lang|title|entity").unwrap();
        path
    }

    fn create_test_index() -> IdentifierIndex {
        let mut index = IdentifierIndex::new();
        index.insert(&LanguageCode::new("en"), "Paris", EntityId::new("Q90"));
        index.insert(&LanguageCode::new("fr"), "Londres", EntityId::new("Q84"));
        index
    }

    #[test]
    fn cache_path_returns_correct_path() {
        let path = cache_path("/output/dir");
        assert_eq!(path, PathBuf::from("/output/dir/index.cache"));
    }

    #[test]
    fn try_load_returns_none_when_no_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.cache");
        assert!(try_load_index(&path, "/some/input").unwrap().is_none());
    }

    #[test]
    fn save_and_load_index_roundtrip() {
        let dir = TempDir::new().unwrap();
        let input_path = create_test_input(&dir);
        let input_str = input_path.to_str().unwrap();
        let output_dir = dir.path().to_str().unwrap();

        save_index(&create_test_index(), input_str, output_dir).unwrap();
        let loaded = try_load_index(&cache_path(output_dir), input_str)
            .unwrap()
            .expect("cache should be valid");

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.resolve("en", "Paris"), Some(&EntityId::new("Q90")));
        assert_eq!(loaded.resolve("fr", "Londres"), Some(&EntityId::new("Q84")));
        assert_eq!(loaded.resolve("en", "Londres"), None);
    }

    #[test]
    fn try_load_returns_none_when_input_modified() {
        let dir = TempDir::new().unwrap();
        let input_path = create_test_input(&dir);
        let input_str = input_path.to_str().unwrap();
        let output_dir = dir.path().to_str().unwrap();

        save_index(&create_test_index(), input_str, output_dir).unwrap();

        let mut file = File::create(&input_path).unwrap();
        writeln!(file, "lang|title|entity\nen|Rome|Q220").unwrap();

        assert!(try_load_index(&cache_path(output_dir), input_str)
            .unwrap()
            .is_none());
    }

    #[test]
    fn try_load_returns_none_for_different_input_path() {
        let dir = TempDir::new().unwrap();
        let input_path = create_test_input(&dir);
        let input_str = input_path.to_str().unwrap();
        let output_dir = dir.path().to_str().unwrap();

        save_index(&create_test_index(), input_str, output_dir).unwrap();

        assert!(
            try_load_index(&cache_path(output_dir), "/different/input/path")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn try_load_returns_none_for_corrupt_cache() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("index.cache");

        let mut file = File::create(&cache_file).unwrap();
        file.write_all(b"not valid bincode data").unwrap();

        assert!(try_load_index(&cache_file, "/some/input").unwrap().is_none());
    }

    #[test]
    fn save_index_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let input_path = create_test_input(&dir);
        let input_str = input_path.to_str().unwrap();
        let nested_output = dir.path().join("nested").join("deep").join("output");
        let output_dir = nested_output.to_str().unwrap();

        save_index(&create_test_index(), input_str, output_dir).unwrap();
        assert!(cache_path(output_dir).exists());
    }
}
