use super::backend::StorageBackend;
use super::entry_store::Document;
use crate::error::{Result, SquirrelError};
use std::cell::{Cell, RefCell};

/// In-memory storage backend.
///
/// Uses `RefCell` for interior mutability since backend calls run on a
/// single thread. This keeps `StorageBackend` on `&self` for all methods.
#[derive(Default)]
pub struct MemBackend {
    document: RefCell<Document>,
    simulate_write_error: Cell<bool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            document: RefCell::new(document),
            simulate_write_error: Cell::new(false),
        }
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }
}

impl StorageBackend for MemBackend {
    fn load_document(&self) -> Result<Document> {
        Ok(self.document.borrow().clone())
    }

    fn save_document(&self, document: &Document) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(SquirrelError::Backend("Simulated write error".to_string()));
        }
        *self.document.borrow_mut() = document.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory://".to_string()
    }
}
