use super::entry_store::Document;
use crate::error::Result;

/// Abstract interface for raw document I/O.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while EntryStore handles the "what" (validation, cascades, archival).
pub trait StorageBackend {
    /// Load the whole document. A store that was never written is empty.
    fn load_document(&self) -> Result<Document>;

    /// Replace the whole document.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn save_document(&self, document: &Document) -> Result<()>;

    /// Human-readable location, for logs and error messages.
    fn location(&self) -> String;
}
