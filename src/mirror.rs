use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// localStorage-compatible keys. One entry per logical collection, each
/// value a JSON-encoded document.
pub mod keys {
    pub const STUDENTS: &str = "students";
    pub const ATTENDANCE_RECORDS: &str = "attendanceRecords";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const APP_SETTINGS: &str = "appSettings";
    pub const DARK_MODE: &str = "darkMode";
}

/// Passive key-value mirror of the in-memory stores. Never a source of
/// truth at runtime: stores rehydrate from it once at workspace selection
/// and write through after each mutation.
pub struct Mirror {
    conn: Connection,
}

pub fn db_path(workspace: &Path) -> std::path::PathBuf {
    workspace.join("studysync.sqlite3")
}

impl Mirror {
    pub fn open(workspace: &Path) -> anyhow::Result<Mirror> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(db_path(workspace))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS mirror(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Mirror { conn })
    }

    pub fn get_raw(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM mirror WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn put_raw(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO mirror(key, value) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, value),
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.conn.execute("DELETE FROM mirror WHERE key = ?", [key])?;
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let Some(text) = self.get_raw(key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.put_raw(key, &serde_json::to_string(value)?)
    }
}
