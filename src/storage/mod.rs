//! Record Storage
//! Mission: Keep each collection in memory and mirror every change to its backing store
//!
//! A collection is read once at startup and rewritten in full on every
//! mutation. Backends only need to load and save a whole collection.

pub mod collection;
pub mod json_file;
pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub use collection::Collection;
pub use json_file::JsonFileRepository;
pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Anything that can live in a collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Whole-collection persistence for one record type.
pub trait Repository<T: Record>: Send + Sync {
    /// Collection name, used for logging and file/table naming
    fn name(&self) -> &str;

    fn load(&self) -> Result<Vec<T>>;

    /// Replace the persisted collection with `records`
    fn save(&self, records: &[T]) -> Result<()>;
}

/// A shared handle persists through the backend it points at
impl<T: Record, R: Repository<T> + ?Sized> Repository<T> for Arc<R> {
    fn name(&self) -> &str {
        Repository::<T>::name(self.as_ref())
    }

    fn load(&self) -> Result<Vec<T>> {
        Repository::<T>::load(self.as_ref())
    }

    fn save(&self, records: &[T]) -> Result<()> {
        Repository::<T>::save(self.as_ref(), records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Json,
    Sqlite,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &str {
        match self {
            StorageBackend::Json => "json",
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("unknown storage backend '{}'", other),
        }
    }
}

/// Open the repository for collection `name` under `data_dir`.
pub fn open_repository<T: Record>(
    backend: StorageBackend,
    data_dir: &Path,
    name: &str,
) -> Result<Box<dyn Repository<T>>> {
    let repo: Box<dyn Repository<T>> = match backend {
        StorageBackend::Json => Box::new(JsonFileRepository::new(data_dir, name)?),
        StorageBackend::Sqlite => {
            Box::new(SqliteRepository::open(&data_dir.join("portal.db"), name)?)
        }
        StorageBackend::Memory => Box::new(MemoryRepository::new(name)),
    };
    Ok(repo)
}
