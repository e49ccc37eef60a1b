//! Single-writer collection
//!
//! The in-memory vector is the source of truth while the process runs.
//! Mutations are staged on a copy, persisted in full, and only then made
//! visible, all while holding the collection lock. Two writers can never
//! interleave a read-modify-write, and a failed save leaves memory untouched.

use super::{Record, Repository};
use anyhow::Context;
use parking_lot::Mutex;
use tracing::debug;

pub struct Collection<T: Record> {
    records: Mutex<Vec<T>>,
    repo: Box<dyn Repository<T>>,
}

impl<T: Record> Collection<T> {
    /// Load the collection once from its repository
    pub fn open(repo: Box<dyn Repository<T>>) -> anyhow::Result<Self> {
        let records = repo
            .load()
            .with_context(|| format!("Failed to load collection {}", repo.name()))?;
        Ok(Self {
            records: Mutex::new(records),
            repo,
        })
    }

    pub fn name(&self) -> &str {
        self.repo.name()
    }

    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let records = self.records.lock();
        f(&records)
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` and persist the result before returning.
    ///
    /// If `f` fails nothing is written; if the save fails the in-memory
    /// state is left as it was.
    pub fn mutate<R, E>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<R, E>) -> Result<R, E>
    where
        E: From<anyhow::Error>,
    {
        let mut records = self.records.lock();
        let mut staged = records.clone();
        let out = f(&mut staged)?;

        self.repo
            .save(&staged)
            .with_context(|| format!("Failed to persist collection {}", self.repo.name()))?;

        debug!(collection = %self.repo.name(), count = staged.len(), "Mutation committed");
        *records = staged;
        Ok(out)
    }
}
