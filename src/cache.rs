//! Closure cache shared across invocations.
//!
//! Only the explicit (import-graph) part of a closure is cached. Ambient
//! declaration files are re-globbed on every call and folded into the
//! fingerprint, so a new `.d.ts` is visible immediately and invalidates the
//! entry it would otherwise hide behind.
//!
//! Entries live in a concurrent in-memory map and, when a directory is
//! configured, as one JSON file per key. Any storage failure degrades to an
//! uncached lookup.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ConfigurationRecord;
use crate::fs::mtime_nanos;

/// Bumped whenever the on-disk entry layout changes.
const CACHE_FORMAT_VERSION: u32 = 1;

/// Address of a cache entry: the merged configuration and the root set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub config_hash: u64,
    pub roots_hash: u64,
}

impl CacheKey {
    pub fn new(record: &ConfigurationRecord, roots: &BTreeSet<PathBuf>) -> Self {
        let mut config_hasher = FxHasher::default();
        record.content_hash.hash(&mut config_hasher);
        record.source_path.hash(&mut config_hasher);

        let mut roots_hasher = FxHasher::default();
        for root in roots {
            root.hash(&mut roots_hasher);
        }

        CacheKey {
            config_hash: config_hasher.finish(),
            roots_hash: roots_hasher.finish(),
        }
    }

    fn file_name(&self) -> String {
        format!("{:016x}-{:016x}.json", self.config_hash, self.roots_hash)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    version: u32,
    pub key: CacheKey,
    /// Hash of every explicit and ambient file with its modification time.
    pub fingerprint: u64,
    pub explicit_files: BTreeSet<PathBuf>,
    pub ambient_files: BTreeSet<PathBuf>,
    pub created_at_ms: u64,
}

/// Fingerprint over the union of `explicit` and `ambient`, including each
/// file's modification time.
pub fn fingerprint(explicit: &BTreeSet<PathBuf>, ambient: &BTreeSet<PathBuf>) -> u64 {
    let mut hasher = FxHasher::default();
    for path in explicit.union(ambient) {
        path.hash(&mut hasher);
        mtime_nanos(path).hash(&mut hasher);
    }
    hasher.finish()
}

pub struct ClosureCache {
    memory: DashMap<CacheKey, CacheEntry>,
    dir: Option<PathBuf>,
}

impl ClosureCache {
    /// Cache that only lives for this process.
    pub fn in_memory() -> Self {
        ClosureCache {
            memory: DashMap::new(),
            dir: None,
        }
    }

    /// Cache backed by JSON files under `dir`. Falls back to memory only when
    /// the directory cannot be created.
    pub fn persistent(dir: &Path) -> Self {
        match std::fs::create_dir_all(dir) {
            Ok(()) => ClosureCache {
                memory: DashMap::new(),
                dir: Some(dir.to_path_buf()),
            },
            Err(err) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %err,
                    "closure cache directory unavailable, caching in memory only"
                );
                Self::in_memory()
            }
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Explicit files for `key` when the entry is still valid against the
    /// freshly globbed `ambient` set.
    pub fn get(&self, key: &CacheKey, ambient: &BTreeSet<PathBuf>) -> Option<BTreeSet<PathBuf>> {
        let entry = match self.memory.get(key) {
            Some(entry) => entry.clone(),
            None => {
                let entry = self.load(key)?;
                self.memory.insert(*key, entry.clone());
                entry
            }
        };

        let current = fingerprint(&entry.explicit_files, ambient);
        if current != entry.fingerprint {
            tracing::debug!(
                config_hash = entry.key.config_hash,
                "closure cache entry is stale"
            );
            self.memory.remove(key);
            return None;
        }
        Some(entry.explicit_files)
    }

    /// Store the explicit discovery result. Last writer wins; entries for the
    /// same key describe the same content.
    pub fn put(&self, key: CacheKey, explicit: &BTreeSet<PathBuf>, ambient: &BTreeSet<PathBuf>) {
        let entry = CacheEntry {
            version: CACHE_FORMAT_VERSION,
            key,
            fingerprint: fingerprint(explicit, ambient),
            explicit_files: explicit.clone(),
            ambient_files: ambient.clone(),
            created_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|duration| duration.as_millis() as u64)
                .unwrap_or(0),
        };
        self.store(&entry);
        self.memory.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    fn load(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.dir.as_ref()?.join(key.file_name());
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable cache entry");
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry>(&text) {
            Ok(entry) if entry.version == CACHE_FORMAT_VERSION && entry.key == *key => Some(entry),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "corrupt cache entry ignored");
                None
            }
        }
    }

    fn store(&self, entry: &CacheEntry) {
        let Some(dir) = self.dir.as_ref() else {
            return;
        };
        if let Err(err) = write_entry(dir, entry) {
            tracing::warn!(dir = %dir.display(), error = %err, "failed to write closure cache entry");
        }
    }
}

/// Write through a temp file and rename so readers never see a torn entry.
fn write_entry(dir: &Path, entry: &CacheEntry) -> std::io::Result<()> {
    let json = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(&json)?;
    file.persist(dir.join(entry.key.file_name()))
        .map_err(|err| err.error)?;
    Ok(())
}
