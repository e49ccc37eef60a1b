//! Volatile backend for tests and throwaway instances.

use super::{Record, Repository};
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct MemoryRepository {
    name: String,
    saved: Mutex<Option<serde_json::Value>>,
    fail_writes: AtomicBool,
}

impl MemoryRepository {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            saved: Mutex::new(None),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `save` fail, simulating a full disk.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl<T: Record> Repository<T> for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<T>> {
        match self.saved.lock().clone() {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, records: &[T]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write to {} rejected", self.name);
        }
        *self.saved.lock() = Some(serde_json::to_value(records)?);
        Ok(())
    }
}
