use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::loader;
use super::model::AccidentDataset;
use crate::error::LoadError;

/// Loads a dataset from a path; swapped out in tests.
pub type LoadFn = fn(&Path) -> Result<AccidentDataset, LoadError>;

/// Memoized datasets keyed by source path.
///
/// Each source is read at most once until it is invalidated. Failed loads
/// are not remembered, so a fixed file can be retried.
pub struct DatasetCache {
    entries: HashMap<PathBuf, Arc<AccidentDataset>>,
    load: LoadFn,
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetCache {
    /// A cache backed by [`loader::load_file`].
    pub fn new() -> Self {
        Self::with_loader(loader::load_file)
    }

    pub fn with_loader(load: LoadFn) -> Self {
        Self {
            entries: HashMap::new(),
            load,
        }
    }

    /// Return the cached dataset for `path`, loading it on first request.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<AccidentDataset>, LoadError> {
        let key = cache_key(path);
        if let Some(dataset) = self.entries.get(&key) {
            log::info!("Using cached dataset for {}", key.display());
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new((self.load)(path)?);
        self.entries.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Drop the entry for `path`. Returns whether one was present.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(&cache_key(path)).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(&cache_key(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical path when it resolves, the literal path otherwise.
fn cache_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::data::model::{Accident, Column};

    static LOADS: AtomicUsize = AtomicUsize::new(0);

    fn counting_loader(path: &Path) -> Result<AccidentDataset, LoadError> {
        if path.ends_with("broken.csv") {
            return Err(LoadError::UnsupportedFormat("broken".into()));
        }
        LOADS.fetch_add(1, Ordering::SeqCst);
        let rows = vec![Accident {
            id: path.display().to_string(),
            ..Default::default()
        }];
        Ok(AccidentDataset::from_accidents(vec![Column::Id], rows).with_source(path))
    }

    #[test]
    fn test_cache_loads_once_and_invalidates() {
        let mut cache = DatasetCache::with_loader(counting_loader);
        let path = Path::new("memory/accidents_a.csv");

        let before = LOADS.load(Ordering::SeqCst);
        let first = cache.get_or_load(path).unwrap();
        let second = cache.get_or_load(path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(LOADS.load(Ordering::SeqCst) - before, 1);
        assert!(cache.contains(path));

        assert!(cache.invalidate(path));
        assert!(!cache.contains(path));
        let third = cache.get_or_load(path).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut cache = DatasetCache::with_loader(counting_loader);
        assert!(cache.get_or_load(Path::new("memory/broken.csv")).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_default_cache_reads_real_files() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "ID,Start_Lat,Start_Lng\nA-1,1.0,2.0").unwrap();

        let mut cache = DatasetCache::new();
        let ds = cache.get_or_load(file.path()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.source.as_deref(), Some(file.path()));
    }
}
