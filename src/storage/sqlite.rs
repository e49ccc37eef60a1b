//! SQLite backend: one table per collection, each row a JSON document.

use super::{Record, Repository};
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

pub struct SqliteRepository {
    name: String,
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the table for collection `name` in the database at `db_path`
    pub fn open(db_path: &Path, name: &str) -> Result<Self> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("invalid collection name '{}'", name);
        }

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        Self::init(conn, name)
    }

    pub fn in_memory(name: &str) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, name)
    }

    fn init(conn: Connection, name: &str) -> Result<Self> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    seq  INTEGER PRIMARY KEY,
                    body TEXT NOT NULL
                )",
                name
            ),
            [],
        )
        .with_context(|| format!("Failed to create table {}", name))?;

        Ok(Self {
            name: name.to_string(),
            conn: Mutex::new(conn),
        })
    }
}

impl<T: Record> Repository<T> for SqliteRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<T>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT body FROM {} ORDER BY seq", self.name))?;

        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let records = bodies
            .iter()
            .map(|body| {
                serde_json::from_str(body)
                    .with_context(|| format!("Corrupt row in table {}", self.name))
            })
            .collect::<Result<Vec<T>>>()?;

        info!(collection = %self.name, count = records.len(), "Collection loaded from SQLite");
        Ok(records)
    }

    fn save(&self, records: &[T]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(&format!("DELETE FROM {}", self.name), [])?;
        {
            let mut insert =
                tx.prepare(&format!("INSERT INTO {} (seq, body) VALUES (?1, ?2)", self.name))?;
            for (seq, record) in records.iter().enumerate() {
                let body = serde_json::to_string(record)?;
                insert.execute(params![seq as i64, body])?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to commit {}", self.name))?;

        debug!(collection = %self.name, count = records.len(), "Collection saved to SQLite");
        Ok(())
    }
}
