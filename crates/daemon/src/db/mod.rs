use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Schema version written to `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// A named video in the clip library. `id` is `None` until the clip has been
/// saved.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub id: Option<i64>,
    pub name: String,
    pub video: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub duration_seconds: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Clip {
    pub fn transient(name: impl Into<String>, video: Vec<u8>, thumbnail: Vec<u8>, duration_seconds: f64) -> Self {
        Clip {
            id: None,
            name: name.into(),
            video,
            thumbnail,
            duration_seconds,
            created_at: None,
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let created_at_str: String = row.get(5)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|_| rusqlite::Error::InvalidColumnType(5, "TEXT".to_string(), rusqlite::types::Type::Text))?
            .with_timezone(&Utc);

        Ok(Clip {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            video: row.get(2)?,
            thumbnail: row.get(3)?,
            duration_seconds: row.get(4)?,
            created_at: Some(created_at),
        })
    }
}

/// Durable clip library. Every public method runs in its own transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.upgrade_schema()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("clip store connection lock poisoned"))
    }

    /// Bring an older file up to [`SCHEMA_VERSION`], one step at a time.
    fn upgrade_schema(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if current >= SCHEMA_VERSION {
            return Ok(());
        }

        let tx = conn.transaction()?;
        if current < 1 {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS clips (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    video BLOB NOT NULL,
                    thumbnail BLOB NOT NULL,
                    duration_seconds REAL NOT NULL,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;
        }
        tx.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
        tx.commit()?;

        info!("[ClipStore] Schema upgraded from v{} to v{}", current, SCHEMA_VERSION);
        Ok(())
    }

    /// All saved clips, newest first.
    pub fn list_clips(&self) -> Result<Vec<Clip>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, video, thumbnail, duration_seconds, created_at FROM clips ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], Clip::from_row)?;

        let mut clips = Vec::new();
        for row in rows {
            clips.push(row?);
        }
        Ok(clips)
    }

    pub fn get_clip(&self, id: i64) -> Result<Option<Clip>> {
        let conn = self.lock()?;
        let clip = conn
            .query_row(
                "SELECT id, name, video, thumbnail, duration_seconds, created_at FROM clips WHERE id = ?1",
                params![id],
                Clip::from_row,
            )
            .optional()?;
        Ok(clip)
    }

    /// Persist a new clip and return its assigned id.
    pub fn add_clip(&self, clip: &Clip) -> Result<i64> {
        let created_at = clip.created_at.unwrap_or_else(Utc::now).to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO clips (name, video, thumbnail, duration_seconds, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![clip.name, clip.video, clip.thumbnail, clip.duration_seconds, created_at],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Overwrite a saved clip in place.
    pub fn put_clip(&self, clip: &Clip) -> Result<()> {
        let id = clip
            .id
            .ok_or_else(|| anyhow!("cannot update clip '{}' before it has been saved", clip.name))?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE clips SET name = ?1, video = ?2, thumbnail = ?3, duration_seconds = ?4 WHERE id = ?5",
            params![clip.name, clip.video, clip.thumbnail, clip.duration_seconds, id],
        )?;
        tx.commit()?;
        if changed == 0 {
            anyhow::bail!("clip {} does not exist", id);
        }
        Ok(())
    }

    /// Returns false when no clip has `id`.
    pub fn rename_clip(&self, id: i64, name: &str) -> Result<bool> {
        let Some(mut clip) = self.get_clip(id)? else {
            return Ok(false);
        };
        clip.name = name.to_string();
        self.put_clip(&clip)?;
        Ok(true)
    }

    /// Returns false when no clip has `id`.
    pub fn delete_clip(&self, id: i64) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let changed = tx.execute("DELETE FROM clips WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(changed > 0)
    }
}
