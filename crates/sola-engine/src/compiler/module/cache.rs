//! Persistent build cache
//!
//! Compiled units live as blobs under `<work_dir>/.sola-cache/`, one per
//! source file, next to an `index.json` that records for each source:
//! - the SHA-256 of the contents the blob was compiled from
//! - the files it depends on
//! - when it was compiled, last read, and how often it was read
//!
//! A lookup misses when the source hash changed or a dependency was compiled
//! after the entry. The index is bounded by entry count (least recently used
//! go first) and by total blob size (least frequently used go first).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::{hash_file, hash_string};
use crate::compiler::bytecode::{
    deserialize_from_bytes, serialize_to_bytes, validate_header, CompiledUnit, EncodeError,
};
use crate::config::CacheConfig;

/// Version written to `index.json`; any other version clears the cache
pub const INDEX_VERSION: &str = "1.0.0";

pub const INDEX_FILE: &str = "index.json";

const BLOB_EXTENSION: &str = "cache";

const NANOS_PER_HOUR: f64 = 3_600_000_000_000.0;

/// Errors raised by the build cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cache index error: {0}")]
    Index(#[from] serde_json::Error),

    #[error("Cache blob error: {0}")]
    Encode(#[from] EncodeError),
}

/// Index record for one cached source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source_hash: String,
    /// Blob file name inside the cache directory
    pub cache_file: String,
    /// Blob size in bytes
    pub size: u64,
    pub dependencies: Vec<String>,
    /// Nanoseconds since the Unix epoch
    pub compiled_at: u64,
    pub accessed_at: u64,
    pub access_count: u64,
}

/// Contents of `index.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheIndex {
    pub version: String,
    pub entries: BTreeMap<String, CacheEntry>,
    pub total_size: u64,
    pub updated_at: u64,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            entries: BTreeMap::new(),
            total_size: 0,
            updated_at: 0,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Bytes held in blobs
    pub total_size: u64,
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
}

impl CacheStats {
    /// Get cache hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    index: CacheIndex,
    hits: usize,
    misses: usize,
}

/// On-disk cache of compiled units.
///
/// Every operation takes the state lock; `stats`, `is_enabled` and the
/// lookups that do not touch the index take it for reading.
#[derive(Debug)]
pub struct CacheManager {
    dir: PathBuf,
    config: CacheConfig,
    state: RwLock<CacheState>,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Index key of a source path
fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `<8 hex of path hash>_<16 hex of content hash>.cache`
pub fn blob_name(source: &Path, source_hash: &str) -> String {
    let path_hash = hash_string(&key(source));
    let content = source_hash.get(..16).unwrap_or(source_hash);
    format!("{}_{}.{}", &path_hash[..8], content, BLOB_EXTENSION)
}

fn decode(bytes: &[u8]) -> Result<CompiledUnit, EncodeError> {
    validate_header(bytes)?;
    deserialize_from_bytes(bytes)
}

fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

impl CacheManager {
    /// Open the cache under `work_dir`, creating the directory when caching
    /// is enabled. An unreadable index or one written by another version
    /// clears the cache.
    pub fn open(work_dir: &Path, config: CacheConfig) -> Result<Self, CacheError> {
        let dir = work_dir.join(&config.dir_name);
        let mut index = CacheIndex::default();
        if config.enabled {
            fs::create_dir_all(&dir)?;
            index = Self::load_index(&dir)?;
            log::debug!("opened cache {} ({} entries)", dir.display(), index.entries.len());
        }
        Ok(Self {
            dir,
            config,
            state: RwLock::new(CacheState {
                index,
                ..CacheState::default()
            }),
        })
    }

    fn load_index(dir: &Path) -> Result<CacheIndex, CacheError> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(CacheIndex::default());
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<CacheIndex>(&content) {
            Ok(index) if index.version == INDEX_VERSION => Ok(index),
            Ok(index) => {
                log::warn!(
                    "cache index version {} does not match {}, clearing",
                    index.version,
                    INDEX_VERSION
                );
                Self::remove_blobs(dir)?;
                Ok(CacheIndex::default())
            }
            Err(err) => {
                log::warn!("unreadable cache index ({}), clearing", err);
                Self::remove_blobs(dir)?;
                Ok(CacheIndex::default())
            }
        }
    }

    fn remove_blobs(dir: &Path) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == BLOB_EXTENSION) {
                remove_file_if_present(&path)?;
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up the compiled unit of `source`.
    ///
    /// Stale and corrupt entries are dropped and reported as misses.
    pub fn get(&self, source: &Path) -> Result<Option<CompiledUnit>, CacheError> {
        if !self.config.enabled {
            return Ok(None);
        }
        let key = key(source);
        let mut state = self.state.write();

        let Some(entry) = state.index.entries.get(&key).cloned() else {
            log::trace!("cache miss: {}", key);
            state.misses += 1;
            return Ok(None);
        };

        if let Some(reason) = Self::staleness(&state.index, source, &entry) {
            log::debug!("cache entry for {} is stale: {}", key, reason);
            self.drop_entry(&mut state, &key)?;
            return Ok(None);
        }

        let blob = self.dir.join(&entry.cache_file);
        let unit = fs::read(&blob)
            .map_err(CacheError::from)
            .and_then(|bytes| decode(&bytes).map_err(CacheError::from));
        let unit = match unit {
            Ok(unit) => unit,
            Err(err) => {
                log::warn!("corrupt cache blob {}: {}", blob.display(), err);
                self.drop_entry(&mut state, &key)?;
                return Ok(None);
            }
        };

        if let Some(entry) = state.index.entries.get_mut(&key) {
            entry.accessed_at = now();
            entry.access_count += 1;
        }
        state.hits += 1;
        log::trace!("cache hit: {}", key);
        self.save_index(&mut state.index)?;
        Ok(Some(unit))
    }

    /// Why `entry` no longer matches `source`, if it doesn't
    fn staleness(index: &CacheIndex, source: &Path, entry: &CacheEntry) -> Option<String> {
        match hash_file(source) {
            Ok(hash) if hash == entry.source_hash => {}
            Ok(_) => return Some("source changed".to_string()),
            Err(err) => return Some(format!("source unreadable: {}", err)),
        }
        entry
            .dependencies
            .iter()
            .find(|dep| {
                index
                    .entries
                    .get(*dep)
                    .is_some_and(|d| d.compiled_at > entry.compiled_at)
            })
            .map(|dep| format!("{} was rebuilt", dep))
    }

    /// Remove an entry found unusable during `get` and count the miss
    fn drop_entry(&self, state: &mut CacheState, key: &str) -> Result<(), CacheError> {
        self.remove_entry(&mut state.index, key)?;
        state.misses += 1;
        self.save_index(&mut state.index)
    }

    /// Store the compiled unit of `source`, then evict down to the limits
    pub fn put(
        &self,
        source: &Path,
        unit: &CompiledUnit,
        dependencies: &[PathBuf],
    ) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }
        let key = key(source);
        let source_hash = hash_file(source)?;
        let cache_file = blob_name(source, &source_hash);
        let bytes = serialize_to_bytes(unit)?;
        fs::write(self.dir.join(&cache_file), &bytes)?;

        let mut state = self.state.write();
        if let Some(old) = state.index.entries.get(&key) {
            if old.cache_file != cache_file {
                remove_file_if_present(&self.dir.join(&old.cache_file))?;
            }
        }
        let timestamp = now();
        state.index.entries.insert(
            key.clone(),
            CacheEntry {
                source_hash,
                cache_file,
                size: bytes.len() as u64,
                dependencies: dependencies.iter().map(|d| self::key(d)).collect(),
                compiled_at: timestamp,
                accessed_at: timestamp,
                access_count: 1,
            },
        );
        state.index.total_size = state.index.entries.values().map(|e| e.size).sum();
        log::debug!("cached {} ({} bytes)", key, bytes.len());

        self.evict(&mut state.index)?;
        self.save_index(&mut state.index)
    }

    fn evict(&self, index: &mut CacheIndex) -> Result<(), CacheError> {
        let count = index.entries.len();
        if count > self.config.max_entries {
            let mut by_age: Vec<(u64, String)> = index
                .entries
                .iter()
                .map(|(key, e)| (e.accessed_at, key.clone()))
                .collect();
            by_age.sort();
            for (_, key) in by_age.into_iter().take(count - self.config.max_entries) {
                log::debug!("evicting {} (least recently used)", key);
                self.remove_entry(index, &key)?;
            }
        }

        if index.total_size > self.config.max_size {
            let timestamp = now();
            let mut scored: Vec<(f64, u64, String)> = index
                .entries
                .iter()
                .map(|(key, e)| {
                    let hours = timestamp.saturating_sub(e.accessed_at) as f64 / NANOS_PER_HOUR;
                    (e.access_count as f64 / (hours + 1.0), e.accessed_at, key.clone())
                })
                .collect();
            scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for (_, _, key) in scored {
                if index.total_size <= self.config.max_size {
                    break;
                }
                log::debug!("evicting {} (cache over {} bytes)", key, self.config.max_size);
                self.remove_entry(index, &key)?;
            }
        }
        Ok(())
    }

    fn remove_entry(&self, index: &mut CacheIndex, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(entry) = index.entries.remove(key) else {
            return Ok(None);
        };
        index.total_size = index.total_size.saturating_sub(entry.size);
        remove_file_if_present(&self.dir.join(&entry.cache_file))?;
        Ok(Some(entry))
    }

    fn save_index(&self, index: &mut CacheIndex) -> Result<(), CacheError> {
        index.updated_at = now();
        let json = serde_json::to_string_pretty(index)?;
        fs::write(self.dir.join(INDEX_FILE), json)?;
        Ok(())
    }

    /// Drop the entry of `source`; returns whether one existed
    pub fn invalidate(&self, source: &Path) -> Result<bool, CacheError> {
        if !self.config.enabled {
            return Ok(false);
        }
        let mut state = self.state.write();
        let removed = self.remove_entry(&mut state.index, &key(source))?.is_some();
        if removed {
            log::debug!("invalidated {}", source.display());
            self.save_index(&mut state.index)?;
        }
        Ok(removed)
    }

    /// Drop every entry that lists `source` among its dependencies
    pub fn invalidate_dependents(&self, source: &Path) -> Result<usize, CacheError> {
        if !self.config.enabled {
            return Ok(0);
        }
        let target = key(source);
        let mut state = self.state.write();
        let dependents: Vec<String> = state
            .index
            .entries
            .iter()
            .filter(|(_, e)| e.dependencies.contains(&target))
            .map(|(key, _)| key.clone())
            .collect();
        for dependent in &dependents {
            log::debug!("invalidated {} (depends on {})", dependent, target);
            self.remove_entry(&mut state.index, dependent)?;
        }
        if !dependents.is_empty() {
            self.save_index(&mut state.index)?;
        }
        Ok(dependents.len())
    }

    /// Remove every blob and reset the index and counters
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.state.write();
        *state = CacheState::default();
        if self.config.enabled {
            Self::remove_blobs(&self.dir)?;
            self.save_index(&mut state.index)?;
        }
        log::debug!("cleared cache {}", self.dir.display());
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            entries: state.index.entries.len(),
            total_size: state.index.total_size,
            hits: state.hits,
            misses: state.misses,
        }
    }

    /// Index record of `source`, without validating it
    pub fn entry(&self, source: &Path) -> Option<CacheEntry> {
        self.state.read().index.entries.get(&key(source)).cloned()
    }

    pub fn contains(&self, source: &Path) -> bool {
        self.state.read().index.entries.contains_key(&key(source))
    }

    pub fn len(&self) -> usize {
        self.state.read().index.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::Function;
    use tempfile::TempDir;

    fn unit(name: &str) -> CompiledUnit {
        CompiledUnit {
            main_function: Function::new("<main>", name),
            source_file: name.to_string(),
            ..CompiledUnit::default()
        }
    }

    fn source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn open(dir: &TempDir) -> CacheManager {
        CacheManager::open(dir.path(), CacheConfig::default()).unwrap()
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let cache = open(&dir);

        cache.put(&a, &unit("a.sola"), &[]).unwrap();
        assert_eq!(cache.get(&a).unwrap(), Some(unit("a.sola")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
        assert_eq!(cache.entry(&a).unwrap().access_count, 2);
    }

    #[test]
    fn test_miss_and_hit_ratio() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let cache = open(&dir);

        assert_eq!(cache.get(&a).unwrap(), None);
        cache.put(&a, &unit("a.sola"), &[]).unwrap();
        cache.get(&a).unwrap();
        cache.get(&a).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_blob_named_from_path_and_content() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let cache = open(&dir);
        cache.put(&a, &unit("a.sola"), &[]).unwrap();

        let entry = cache.entry(&a).unwrap();
        let expected = format!(
            "{}_{}.cache",
            &hash_string(&a.to_string_lossy())[..8],
            &hash_string("var $x = 1;")[..16]
        );
        assert_eq!(entry.cache_file, expected);
        assert!(cache.dir().join(&expected).exists());
        assert_eq!(entry.size, fs::metadata(cache.dir().join(&expected)).unwrap().len());
    }

    #[test]
    fn test_changed_source_misses() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let cache = open(&dir);
        cache.put(&a, &unit("a.sola"), &[]).unwrap();

        fs::write(&a, "var $x = 2;").unwrap();
        assert_eq!(cache.get(&a).unwrap(), None);
        assert!(!cache.contains(&a));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_rebuilt_dependency_misses() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "use b;");
        let b = source(&dir, "b.sola", "var $y = 1;");
        let cache = open(&dir);

        cache.put(&b, &unit("b.sola"), &[]).unwrap();
        cache.put(&a, &unit("a.sola"), &[b.clone()]).unwrap();
        assert!(cache.get(&a).unwrap().is_some());

        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.put(&b, &unit("b.sola"), &[]).unwrap();
        assert_eq!(cache.get(&a).unwrap(), None);
        assert!(cache.contains(&b));
    }

    #[test]
    fn test_corrupt_blob_misses() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let cache = open(&dir);
        cache.put(&a, &unit("a.sola"), &[]).unwrap();

        let blob = cache.dir().join(cache.entry(&a).unwrap().cache_file);
        fs::write(&blob, b"SOLA but not really").unwrap();
        assert_eq!(cache.get(&a).unwrap(), None);
        assert!(!cache.contains(&a));
        assert!(!blob.exists());
    }

    // ── Persistence ─────────────────────────────────────────────────────

    #[test]
    fn test_index_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        open(&dir).put(&a, &unit("a.sola"), &[]).unwrap();

        let index: CacheIndex = serde_json::from_str(
            &fs::read_to_string(dir.path().join(".sola-cache").join(INDEX_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(index.version, "1.0.0");
        assert_eq!(index.entries.len(), 1);

        let reopened = open(&dir);
        assert_eq!(reopened.get(&a).unwrap(), Some(unit("a.sola")));
    }

    #[test]
    fn test_version_mismatch_clears() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let cache = open(&dir);
        cache.put(&a, &unit("a.sola"), &[]).unwrap();
        let blob = cache.dir().join(cache.entry(&a).unwrap().cache_file);
        drop(cache);

        let index_path = dir.path().join(".sola-cache").join(INDEX_FILE);
        let mut index: CacheIndex =
            serde_json::from_str(&fs::read_to_string(&index_path).unwrap()).unwrap();
        index.version = "0.9.0".to_string();
        fs::write(&index_path, serde_json::to_string(&index).unwrap()).unwrap();

        let reopened = open(&dir);
        assert!(reopened.is_empty());
        assert!(!blob.exists());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = CacheManager::open(dir.path(), config).unwrap();
        cache.put(&a, &unit("a.sola"), &[]).unwrap();
        assert_eq!(cache.get(&a).unwrap(), None);
        assert!(!dir.path().join(".sola-cache").exists());
    }

    // ── Eviction and invalidation ───────────────────────────────────────

    #[test]
    fn test_entry_limit_evicts_least_recently_used() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let cache = CacheManager::open(dir.path(), config).unwrap();
        let files: Vec<PathBuf> = ["a", "b", "c"]
            .iter()
            .map(|n| source(&dir, &format!("{}.sola", n), n))
            .collect();

        cache.put(&files[0], &unit("a"), &[]).unwrap();
        cache.put(&files[1], &unit("b"), &[]).unwrap();
        // Reading `a` makes `b` the oldest
        cache.get(&files[0]).unwrap();
        cache.put(&files[2], &unit("c"), &[]).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&files[0]));
        assert!(!cache.contains(&files[1]));
        assert!(cache.contains(&files[2]));
    }

    #[test]
    fn test_size_limit_holds_after_put() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "a");
        let probe = CacheManager::open(dir.path(), CacheConfig::default()).unwrap();
        probe.put(&a, &unit("a"), &[]).unwrap();
        let one = probe.stats().total_size;
        probe.clear().unwrap();

        let config = CacheConfig {
            max_size: one * 2 + one / 2,
            ..CacheConfig::default()
        };
        let cache = CacheManager::open(dir.path(), config).unwrap();
        for name in ["a", "b", "c", "d"] {
            let path = source(&dir, &format!("{}.sola", name), name);
            cache.put(&path, &unit(name), &[]).unwrap();
            assert!(cache.stats().total_size <= cache.config().max_size);
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_dependents() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "use c;");
        let b = source(&dir, "b.sola", "use c;");
        let c = source(&dir, "c.sola", "");
        let cache = open(&dir);
        cache.put(&c, &unit("c"), &[]).unwrap();
        cache.put(&a, &unit("a"), &[c.clone()]).unwrap();
        cache.put(&b, &unit("b"), &[c.clone()]).unwrap();

        assert_eq!(cache.invalidate_dependents(&c).unwrap(), 2);
        assert!(cache.contains(&c));
        assert!(cache.invalidate(&c).unwrap());
        assert!(!cache.invalidate(&c).unwrap());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().total_size, 0);
    }

    #[test]
    fn test_clear_removes_blobs() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.sola", "var $x = 1;");
        let cache = open(&dir);
        cache.put(&a, &unit("a"), &[]).unwrap();
        cache.get(&a).unwrap();

        cache.clear().unwrap();
        assert_eq!(cache.stats(), CacheStats::default());
        let blobs = fs::read_dir(cache.dir())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "cache"))
            .count();
        assert_eq!(blobs, 0);
    }
}
