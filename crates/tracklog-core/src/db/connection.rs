//! Database connection management

use std::path::Path;

use rusqlite::Connection;

use super::schema;
use crate::error::Result;

/// Database wrapper for a `SQLite` connection
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Ensures every category table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let database = Self {
            conn: Connection::open(path)?,
        };
        database.configure()?;
        schema::ensure_all(&database.conn)?;
        tracing::debug!("Opened database at {}", path.display());
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let database = Self {
            conn: Connection::open_in_memory()?,
        };
        database.configure()?;
        schema::ensure_all(&database.conn)?;
        Ok(database)
    }

    /// Configure `SQLite` for a single local writer
    fn configure(&self) -> Result<()> {
        let conn = &self.conn;
        let read_mode = |row: &rusqlite::Row<'_>| row.get::<_, String>(0);
        // In-memory databases report "memory" and keep it
        if let Err(error) = conn.pragma_update_and_check(None, "journal_mode", "WAL", read_mode) {
            tracing::debug!("Could not enable WAL mode: {}", error);
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
