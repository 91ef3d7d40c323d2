use std::path::PathBuf;

use super::entry_store::EntryStore;
use super::fs_backend::FsBackend;

/// File-backed store: the whole database is one JSON document.
pub type FileStore = EntryStore<FsBackend>;

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// Nothing touches the disk until the first write; a missing file reads
    /// as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        EntryStore::with_backend(FsBackend::new(path))
    }

    pub fn path(&self) -> &std::path::Path {
        self.backend.path()
    }
}
