use crate::store::fs::FileStore;
use std::path::PathBuf;
use tempfile::TempDir;

/// A file store in a throwaway directory.
pub struct TestEnv {
    // Keeps the directory alive for the duration of the test
    pub _temp_dir: TempDir,
    pub store: FileStore,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let store = FileStore::open(root.join("filestore.json"));
        Self {
            _temp_dir: temp_dir,
            store,
            root,
        }
    }

    /// A second handle on the same file, as another process would see it.
    pub fn reopen(&self) -> FileStore {
        FileStore::open(self.store.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Backend, NewPv};

    #[test]
    fn test_reopen_sees_writes() {
        let mut env = TestEnv::new();
        env.store.add_pv(NewPv::new(Some("SP"), None, "")).unwrap();
        assert_eq!(env.reopen().get_all_pvs().unwrap().len(), 1);
        assert!(env.root.join("filestore.json").is_file());
    }
}
