use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use super::ExtractedModule;
use crate::config::MarkerConfig;
use crate::core::Module;

const DEFAULT_MAX_MEMORY_ENTRIES: usize = 1000;

/// Bumped whenever `ExtractedModule` changes shape.
const CACHE_FORMAT_VERSION: u32 = 1;

/// On-disk record; `fingerprint` guards against hash-named file collisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExtraction {
    pub fingerprint: u64,
    pub extracted: ExtractedModule,
}

/// Thread-safe memo of extraction results keyed by module content.
///
/// Entries are looked up by a fingerprint of everything extraction depends
/// on, so a hit is always identical to a fresh parse.
pub struct ParseCache {
    memory_cache: DashMap<u64, ExtractedModule>,
    cache_dir: Option<PathBuf>,
    max_memory_entries: usize,
}

impl ParseCache {
    /// Memory cache backed by `cache_dir` when given (best effort).
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        let cache_dir = cache_dir.and_then(|dir| match fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(err) => {
                tracing::warn!(
                    "Failed to initialize disk cache at {}: {err}",
                    dir.display()
                );
                None
            }
        });

        Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        }
    }

    /// Build an in-memory-only cache without touching the filesystem
    pub fn in_memory_only() -> Self {
        Self::new(None)
    }

    pub fn fingerprint(module: &Module, markers: &MarkerConfig) -> u64 {
        let mut hasher = DefaultHasher::new();
        CACHE_FORMAT_VERSION.hash(&mut hasher);
        module.id.hash(&mut hasher);
        module.is_package.hash(&mut hasher);
        markers.hash(&mut hasher);
        module.source.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, fingerprint: u64) -> Option<ExtractedModule> {
        if let Some(entry) = self.memory_cache.get(&fingerprint) {
            return Some(entry.clone());
        }

        let cache_path = self.cache_path(fingerprint)?;
        let record = self.load_from_disk(&cache_path).ok()?;
        if record.fingerprint != fingerprint {
            return None;
        }
        if self.memory_cache.len() < self.max_memory_entries {
            self.memory_cache
                .insert(fingerprint, record.extracted.clone());
        }
        Some(record.extracted)
    }

    pub fn store(&self, fingerprint: u64, extracted: &ExtractedModule) -> Result<()> {
        if self.memory_cache.len() >= self.max_memory_entries {
            if let Some(entry) = self.memory_cache.iter().next() {
                let key = *entry.key();
                drop(entry);
                self.memory_cache.remove(&key);
            }
        }
        self.memory_cache.insert(fingerprint, extracted.clone());

        if let Some(cache_path) = self.cache_path(fingerprint) {
            let record = CachedExtraction {
                fingerprint,
                extracted: extracted.clone(),
            };
            self.store_to_disk(&cache_path, &record)?;
        }

        Ok(())
    }

    /// Clear all caches
    pub fn clear(&self) -> Result<()> {
        self.memory_cache.clear();
        if let Some(cache_dir) = &self.cache_dir {
            if cache_dir.exists() {
                fs::remove_dir_all(cache_dir)?;
                fs::create_dir_all(cache_dir)?;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory_cache.len(),
            disk_entries: self.disk_entry_count(),
        }
    }

    fn cache_path(&self, fingerprint: u64) -> Option<PathBuf> {
        let cache_dir = self.cache_dir.as_ref()?;
        Some(cache_dir.join(format!("extract_{:016x}.bincode", fingerprint)))
    }

    fn load_from_disk(&self, cache_path: &Path) -> Result<CachedExtraction> {
        let data = fs::read(cache_path)?;
        let record: CachedExtraction = bincode::deserialize(&data)?;
        Ok(record)
    }

    fn store_to_disk(&self, cache_path: &Path, record: &CachedExtraction) -> Result<()> {
        let data = bincode::serialize(record)?;
        fs::write(cache_path, data)?;
        Ok(())
    }

    fn disk_entry_count(&self) -> usize {
        self.cache_dir
            .as_ref()
            .and_then(|dir| fs::read_dir(dir).ok())
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
}
