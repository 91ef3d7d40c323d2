use super::backend::StorageBackend;
use super::entry_store::Document;
use crate::error::{Result, SquirrelError};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One pretty-printed JSON document on disk.
pub struct FsBackend {
    path: PathBuf,
}

impl FsBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<PathBuf> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(SquirrelError::Io)?;
        }
        Ok(parent)
    }
}

impl StorageBackend for FsBackend {
    fn load_document(&self) -> Result<Document> {
        if !self.path.exists() {
            return Ok(Document::default());
        }
        let content = fs::read_to_string(&self.path).map_err(SquirrelError::Io)?;
        if content.trim().is_empty() {
            return Ok(Document::default());
        }
        let document: Document =
            serde_json::from_str(&content).map_err(SquirrelError::Serialization)?;
        Ok(document)
    }

    fn save_document(&self, document: &Document) -> Result<()> {
        let parent = self.ensure_parent()?;
        let content =
            serde_json::to_string_pretty(document).map_err(SquirrelError::Serialization)?;

        // Atomic write
        let tmp_file = parent.join(format!(".squirrel-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(SquirrelError::Io)?;
        if let Err(err) = fs::rename(&tmp_file, &self.path) {
            let _ = fs::remove_file(&tmp_file);
            return Err(SquirrelError::Io(err));
        }

        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
