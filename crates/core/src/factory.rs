//! Per-path parse cache and `!include` cycle detection.
//!
//! Grounded on the original parser's module-level `gSdict`/`gFdict`
//! singleton caches, reworked as an explicit, owned cache instead of a
//! process-global: a path entering parsing while already `InProgress`
//! indicates a cycle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ParseError, ParseResult};
use crate::store::RecordStore;

enum CacheEntry {
    InProgress,
    Done(Arc<RecordStore>),
}

/// Caches parsed [`RecordStore`]s by canonical path, so a file included
/// from multiple places is parsed once, and re-entry while still
/// `InProgress` is reported as an include cycle.
#[derive(Default)]
pub struct ParserFactory {
    cache: HashMap<PathBuf, CacheEntry>,
    next_file_index: i64,
}

impl ParserFactory {
    /// A fresh, empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as currently being parsed. Returns [`ParseError::IncludeCycle`]
    /// if `path` is already in progress.
    pub fn begin(&mut self, path: &Path) -> ParseResult<()> {
        if matches!(self.cache.get(path), Some(CacheEntry::InProgress)) {
            return Err(ParseError::IncludeCycle(path.to_path_buf()));
        }
        self.cache
            .entry(path.to_path_buf())
            .or_insert(CacheEntry::InProgress);
        Ok(())
    }

    /// Record the finished store for `path`, replacing its `InProgress` marker.
    pub fn finish(&mut self, path: &Path, store: RecordStore) -> Arc<RecordStore> {
        let arc = Arc::new(store);
        self.cache
            .insert(path.to_path_buf(), CacheEntry::Done(Arc::clone(&arc)));
        arc
    }

    /// The cached store for `path`, if parsing has completed.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<RecordStore>> {
        match self.cache.get(path) {
            Some(CacheEntry::Done(store)) => Some(Arc::clone(store)),
            _ => None,
        }
    }

    /// Allocate the next per-file id-block index, for use with [`RecordStore::new`].
    pub fn next_file_index(&mut self) -> i64 {
        let idx = self.next_file_index;
        self.next_file_index += 1;
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_then_begin_again_is_a_cycle() {
        let mut factory = ParserFactory::new();
        let path = PathBuf::from("/tmp/a.dsc");
        factory.begin(&path).unwrap();
        let err = factory.begin(&path).unwrap_err();
        assert!(matches!(err, ParseError::IncludeCycle(p) if p == path));
    }

    #[test]
    fn finish_replaces_in_progress_and_is_retrievable() {
        let mut factory = ParserFactory::new();
        let path = PathBuf::from("/tmp/a.dsc");
        factory.begin(&path).unwrap();
        let idx = factory.next_file_index();
        factory.finish(&path, RecordStore::new(idx));
        assert!(factory.get(&path).is_some());
        // re-entering after completion is not a cycle
        assert!(factory.begin(&path).is_ok());
    }

    #[test]
    fn file_indices_are_distinct_and_increasing() {
        let mut factory = ParserFactory::new();
        assert_eq!(factory.next_file_index(), 0);
        assert_eq!(factory.next_file_index(), 1);
    }
}
