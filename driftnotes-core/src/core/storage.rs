use crate::Result;
use rusqlite::Connection;
use std::path::Path;

/// The on-disk layout version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Owns the SQLite connection backing a note store.
///
/// `Storage` is purely the persistence handle: it applies the schema,
/// validates foreign databases on open, and hands out the connection.
/// All note semantics live in [`NoteStore`](crate::NoteStore).
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    /// Opens an existing database at `path`, rejecting files that are not
    /// a Driftnotes note store or were written by a newer schema version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Validate database structure
        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table'
             AND name IN ('notes', 'store_meta')",
            [],
            |row| row.get(0),
        )?;

        if table_count != 2 {
            return Err(crate::DriftnotesError::InvalidStore(
                "Not a valid Driftnotes database".to_string(),
            ));
        }

        let version: u32 = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )?
            .parse()
            .map_err(|_| {
                crate::DriftnotesError::InvalidStore("Unreadable schema version".to_string())
            })?;

        if version > SCHEMA_VERSION {
            return Err(crate::DriftnotesError::InvalidStore(format!(
                "Store schema version {version} is newer than this build supports"
            )));
        }

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
