use super::backend::{DocumentData, StorageBackend};
use crate::error::{Result, VarsError};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;

/// In-memory storage backend for testing.
///
/// Uses `RefCell` for interior mutability since the registry is
/// single-threaded, which lets `StorageBackend` keep `&self` everywhere.
#[derive(Default)]
pub struct MemBackend {
    data: RefCell<Option<DocumentData>>,
    saves: Cell<usize>,
    simulate_write_error: Cell<bool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already populated document.
    pub fn with_data(data: DocumentData) -> Self {
        Self {
            data: RefCell::new(Some(data)),
            ..Self::default()
        }
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// The last saved document.
    pub fn snapshot(&self) -> Option<DocumentData> {
        self.data.borrow().clone()
    }
}

impl StorageBackend for MemBackend {
    fn load(&self) -> Result<Option<DocumentData>> {
        Ok(self.data.borrow().clone())
    }

    fn save(&self, data: &DocumentData) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(VarsError::Store("Simulated write error".to_string()));
        }
        *self.data.borrow_mut() = Some(data.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory://document")
    }
}
