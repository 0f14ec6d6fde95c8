//! Read queries over the catalog: candidate records, tagged records, schema.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use rusqlite::{params, Connection, Row};

use super::CatalogRecord;

/// Keyword linked to every record this tool has finished.
pub const PROCESSED_KEYWORD: &str = "AI_Processed";

const CANDIDATES_SQL: &str = "
    SELECT
        i.id_local,
        f.id_local,
        f.baseName,
        fo.pathFromRoot,
        r.absolutePath,
        i.id_global,
        f.id_global,
        i.captureTime
    FROM AgLibraryFile f
    JOIN AgLibraryFolder fo ON f.folder = fo.id_local
    JOIN AgLibraryRootFolder r ON fo.rootFolder = r.id_local
    JOIN Adobe_images i ON i.rootFile = f.id_local
    WHERE f.importHash IS NOT NULL
    ORDER BY i.id_local
    LIMIT ?1";

impl CatalogRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let root: Option<String> = row.get(4)?;
        Ok(Self {
            record_id: row.get(0)?,
            file_id: row.get(1)?,
            base_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            path_from_root: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            root_folder: PathBuf::from(root.unwrap_or_default()),
            image_global_id: row.get(5)?,
            file_global_id: row.get(6)?,
            capture_time: row.get(7)?,
        })
    }
}

/// Imported records ordered by image id, at most `max` of them.
pub fn list_candidates(
    conn: &Connection,
    max: Option<usize>,
) -> Result<Vec<CatalogRecord>, rusqlite::Error> {
    let limit: i64 = match max {
        Some(n) if n > 0 => i64::try_from(n).unwrap_or(i64::MAX),
        _ => -1,
    };
    let mut stmt = conn.prepare(CANDIDATES_SQL)?;
    let rows = stmt.query_map(params![limit], CatalogRecord::from_row)?;
    rows.collect()
}

/// Record ids already linked to the processed keyword.
pub fn list_already_tagged(conn: &Connection) -> Result<HashSet<i64>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT ki.image
         FROM AgLibraryKeywordImage ki
         JOIN AgLibraryKeyword k ON ki.tag = k.id_local
         WHERE k.name = ?1",
    )?;
    let rows = stmt.query_map(params![PROCESSED_KEYWORD], |row| row.get(0))?;
    rows.collect()
}

/// Table names and their column names.
pub fn probe_tables(conn: &Connection) -> Result<HashMap<String, HashSet<String>>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    let mut tables = HashMap::with_capacity(names.len());
    for name in names {
        let sql = format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\""));
        let mut info = conn.prepare(&sql)?;
        let columns: HashSet<String> = info
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;
        tables.insert(name, columns);
    }
    Ok(tables)
}
