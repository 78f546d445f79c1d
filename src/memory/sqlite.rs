use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

use super::{Memory, MemoryEntry};

/// SQLite-backed memory. The batch runner opens one `:memory:` database
/// per item so concurrent items never see each other's history.
pub struct SqliteMemory {
    conn: Mutex<Connection>,
}

impl SqliteMemory {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT (datetime('now')),
                entry TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("memory connection lock poisoned"))
    }
}

#[async_trait]
impl Memory for SqliteMemory {
    async fn store(&self, entry: MemoryEntry) -> Result<()> {
        let json = serde_json::to_string(&entry)?;
        let conn = self.conn()?;
        conn.execute("INSERT INTO memory (entry) VALUES (?1)", [&json])?;
        Ok(())
    }

    async fn history(&self) -> Result<Vec<MemoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT entry FROM memory ORDER BY id ASC")?;
        let jsons = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let entries = jsons
            .iter()
            .map(|json| serde_json::from_str(json))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
