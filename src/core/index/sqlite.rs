//! SQLite index backend.
//!
//! Normalized layout: `hash`, `file_type` and `directory` lookup tables,
//! a `file` table referencing all three, and the `file_props` view joining
//! them back into `(file_name, dir_name, file_type, hash)` rows.
//!
//! Databases from the older layout (lookup tables keyed by `rowid` only,
//! file names unique across the whole library) are read and extended in
//! place; every query here goes through `rowid`, which both layouts share.

use super::{IndexBackend, IndexEntry};
use crate::error::IndexError;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS hash (
        id INTEGER PRIMARY KEY,
        value TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS file_type (
        id INTEGER PRIMARY KEY,
        type TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS directory (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS file (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        hash_id INTEGER NOT NULL UNIQUE REFERENCES hash(id),
        dir_id INTEGER NOT NULL REFERENCES directory(id),
        type_id INTEGER NOT NULL REFERENCES file_type(id)
    );
    CREATE VIEW IF NOT EXISTS file_props AS
        SELECT file.name AS file_name,
               directory.name AS dir_name,
               file_type.type AS file_type,
               hash.value AS hash
        FROM file
        JOIN directory ON file.dir_id = directory.id
        JOIN file_type ON file.type_id = file_type.id
        JOIN hash ON file.hash_id = hash.id;
";

/// SQLite-backed index
///
/// Every insert commits on its own, so an interrupted run loses at most the
/// unit in flight.
pub struct SqliteIndex {
    conn: Connection,
    db_path: PathBuf,
    /// Older layout: no `id` columns, `file.name` is the primary key
    legacy: bool,
}

impl SqliteIndex {
    /// Open or create an index database at the given path
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path).map_err(|e| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let corrupt = |e: rusqlite::Error| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(corrupt)?;
        conn.execute_batch(SCHEMA).map_err(corrupt)?;

        let legacy = is_legacy(&conn).map_err(corrupt)?;
        if legacy {
            // Its foreign keys name `rowid`, which SQLite cannot enforce.
            warn!(
                "{} uses the older index layout; file names must be unique across the library",
                path.display()
            );
        } else {
            conn.execute_batch("PRAGMA foreign_keys=ON;").map_err(corrupt)?;
        }

        Ok(Self {
            conn,
            db_path: path.to_path_buf(),
            legacy,
        })
    }

    /// Open an existing database for reading only; the index is never written
    pub fn open_read_only(path: &Path) -> Result<Self, IndexError> {
        let corrupt = |e: rusqlite::Error| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(corrupt)?;
        let legacy = is_legacy(&conn).map_err(corrupt)?;

        Ok(Self {
            conn,
            db_path: path.to_path_buf(),
            legacy,
        })
    }

    /// Row id of `value` in a lookup table, inserting it if new
    fn lookup_id(
        tx: &Transaction<'_>,
        table: &str,
        column: &str,
        value: &str,
    ) -> rusqlite::Result<i64> {
        tx.execute(
            &format!("INSERT OR IGNORE INTO {table} ({column}) VALUES (?1)"),
            [value],
        )?;
        tx.query_row(
            &format!("SELECT rowid FROM {table} WHERE {column} = ?1"),
            [value],
            |row| row.get(0),
        )
    }

    /// Where an already indexed fingerprint was filed
    fn existing_path(&self, fingerprint: &str) -> Result<PathBuf, IndexError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT directory.name, file.name FROM file
                 JOIN directory ON file.dir_id = directory.rowid
                 JOIN hash ON file.hash_id = hash.rowid
                 WHERE hash.value = ?1",
                [fingerprint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| IndexError::Query(e.to_string()))?;

        Ok(row
            .map(|(dir, name)| Path::new(&dir).join(name))
            .unwrap_or_default())
    }

    /// Older databases key `file` on the bare name
    fn name_taken(tx: &Transaction<'_>, filename: &str) -> Result<bool, IndexError> {
        tx.query_row("SELECT 1 FROM file WHERE name = ?1", [filename], |_| Ok(()))
            .optional()
            .map(|row| row.is_some())
            .map_err(|e| IndexError::Query(e.to_string()))
    }
}

/// Whether the lookup tables lack the `id` column of the current layout
fn is_legacy(conn: &Connection) -> rusqlite::Result<bool> {
    let ids: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('hash') WHERE name = 'id'",
        [],
        |row| row.get(0),
    )?;
    Ok(ids == 0)
}

impl IndexBackend for SqliteIndex {
    fn load(&mut self) -> Result<Vec<IndexEntry>, IndexError> {
        info!("loading index {}", self.db_path.display());

        // Positional access keeps databases written by older tools readable.
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM file_props")
            .map_err(|e| IndexError::Corrupt {
                path: self.db_path.clone(),
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok(IndexEntry {
                    filename: row.get(0)?,
                    directory: row.get(1)?,
                    file_type: row.get(2)?,
                    fingerprint: row.get(3)?,
                })
            })
            .map_err(|e| IndexError::Query(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| IndexError::Corrupt {
                path: self.db_path.clone(),
                reason: e.to_string(),
            })?);
        }

        info!("index load finished, {} entries", entries.len());
        Ok(entries)
    }

    fn insert(&mut self, entry: &IndexEntry) -> Result<(), IndexError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| IndexError::Query(e.to_string()))?;

        match tx.execute("INSERT INTO hash (value) VALUES (?1)", [&entry.fingerprint]) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                drop(tx);
                return Err(IndexError::DuplicateKey {
                    fingerprint: entry.fingerprint.clone(),
                    existing: self.existing_path(&entry.fingerprint)?,
                });
            }
            Err(e) => return Err(IndexError::Query(e.to_string())),
        }
        let hash_id = tx.last_insert_rowid();

        if self.legacy && Self::name_taken(&tx, &entry.filename)? {
            return Err(IndexError::Query(format!(
                "{} already holds a file named {}; run `photo-sort migrate` to move to the current layout",
                self.db_path.display(),
                entry.filename
            )));
        }

        let dir_id = Self::lookup_id(&tx, "directory", "name", &entry.directory)
            .map_err(|e| IndexError::Query(e.to_string()))?;
        let type_id = Self::lookup_id(&tx, "file_type", "type", &entry.file_type)
            .map_err(|e| IndexError::Query(e.to_string()))?;

        tx.execute(
            "INSERT INTO file (name, hash_id, dir_id, type_id) VALUES (?1, ?2, ?3, ?4)",
            params![entry.filename, hash_id, dir_id, type_id],
        )
        .map_err(|e| IndexError::Query(e.to_string()))?;

        tx.commit().map_err(|e| IndexError::Query(e.to_string()))?;
        debug!("indexed {} as {}/{}", entry.fingerprint, entry.directory, entry.filename);
        Ok(())
    }

    fn flush(&mut self, _entries: &[&IndexEntry]) -> Result<(), IndexError> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .map_err(|e| IndexError::Query(e.to_string()))
    }

    fn close(self: Box<Self>) -> Result<(), IndexError> {
        let SqliteIndex { conn, db_path, .. } = *self;
        conn.close().map_err(|(_, e)| IndexError::Io {
            path: db_path,
            source: std::io::Error::other(e),
        })
    }

    fn location(&self) -> &Path {
        &self.db_path
    }
}
