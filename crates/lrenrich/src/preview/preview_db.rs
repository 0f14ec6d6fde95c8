//! Read-only access to the `previews.db` file kept inside a previews directory.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

pub const PREVIEW_DB_FILE: &str = "previews.db";

/// Tables that map a catalog image to its preview uuid, newest layout first.
const UUID_QUERIES: &[(&str, &str)] = &[
    ("AgPreviewImages", "SELECT uuid FROM AgPreviewImages WHERE image = ?1"),
    ("ImageCacheEntry", "SELECT uuid FROM ImageCacheEntry WHERE imageId = ?1"),
];

#[derive(Debug, Clone)]
pub struct PreviewDatabase {
    path: PathBuf,
}

impl PreviewDatabase {
    /// Returns a handle when `previews.db` exists in `previews_dir`.
    pub fn locate(previews_dir: &Path) -> Option<Self> {
        let path = previews_dir.join(PREVIEW_DB_FILE);
        path.is_file().then_some(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Looks up the preview uuid for a catalog image id.
    pub fn preview_uuid(&self, record_id: i64) -> Result<Option<String>, rusqlite::Error> {
        let conn = self.connect()?;
        for (table, sql) in UUID_QUERIES {
            if !table_exists(&conn, table)? {
                continue;
            }
            let uuid: Option<Option<String>> = conn
                .query_row(sql, params![record_id], |row| row.get(0))
                .optional()?;
            if let Some(Some(uuid)) = uuid {
                if !uuid.is_empty() {
                    return Ok(Some(uuid));
                }
            }
        }
        Ok(None)
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}
