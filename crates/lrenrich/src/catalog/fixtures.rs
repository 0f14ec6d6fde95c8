//! Minimal Lightroom-shaped catalogs for unit tests.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

pub(crate) const CATALOG_DDL: &str = "
    CREATE TABLE AgLibraryRootFolder (id_local INTEGER PRIMARY KEY, absolutePath TEXT);
    CREATE TABLE AgLibraryFolder (id_local INTEGER PRIMARY KEY, rootFolder INTEGER, pathFromRoot TEXT);
    CREATE TABLE AgLibraryFile (
        id_local INTEGER PRIMARY KEY,
        folder INTEGER,
        baseName TEXT,
        importHash TEXT,
        id_global TEXT
    );
    CREATE TABLE Adobe_images (
        id_local INTEGER PRIMARY KEY,
        rootFile INTEGER,
        id_global TEXT,
        captureTime TEXT,
        rating REAL,
        caption TEXT
    );
    CREATE TABLE AgLibraryKeyword (
        id_local INTEGER PRIMARY KEY,
        name TEXT,
        lc_name TEXT,
        includeOnExport INTEGER,
        id_global TEXT
    );
    CREATE TABLE AgLibraryKeywordImage (id_local INTEGER PRIMARY KEY, image INTEGER, tag INTEGER);
    CREATE TABLE Adobe_additionalMetadata (
        id_local INTEGER PRIMARY KEY,
        image INTEGER,
        externalEditingData TEXT
    );
";

pub(crate) fn create_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("Test.lrcat");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(CATALOG_DDL).unwrap();
    path
}

/// Adds an imported photo under `/photos/2023/`; the file id is `record_id + 1000`.
pub(crate) fn add_record(path: &Path, record_id: i64, base_name: &str) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "INSERT OR IGNORE INTO AgLibraryRootFolder (id_local, absolutePath) VALUES (1, '/photos/');
         INSERT OR IGNORE INTO AgLibraryFolder (id_local, rootFolder, pathFromRoot) VALUES (1, 1, '2023/');",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO AgLibraryFile (id_local, folder, baseName, importHash, id_global)
         VALUES (?1, 1, ?2, 'hash', ?3)",
        params![record_id + 1000, base_name, format!("{:032X}", 0xF11E_0000 + record_id)],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO Adobe_images (id_local, rootFile, id_global, captureTime)
         VALUES (?1, ?2, ?3, '2023-06-01T12:00:00')",
        params![record_id, record_id + 1000, format!("{:032X}", 0x1A6E_0000 + record_id)],
    )
    .unwrap();
}

pub(crate) fn tag_processed(path: &Path, record_id: i64) {
    let conn = Connection::open(path).unwrap();
    conn.execute(
        "INSERT INTO AgLibraryKeyword (name, lc_name, includeOnExport, id_global)
         SELECT 'AI_Processed', 'ai_processed', 1, 'FIXTURE'
         WHERE NOT EXISTS (SELECT 1 FROM AgLibraryKeyword WHERE name = 'AI_Processed')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO AgLibraryKeywordImage (image, tag)
         SELECT ?1, id_local FROM AgLibraryKeyword WHERE name = 'AI_Processed'",
        params![record_id],
    )
    .unwrap();
}

/// Keyword names linked to `record_id`, sorted.
pub(crate) fn linked_keywords(path: &Path, record_id: i64) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT k.name FROM AgLibraryKeywordImage ki
             JOIN AgLibraryKeyword k ON ki.tag = k.id_local
             WHERE ki.image = ?1 ORDER BY k.name",
        )
        .unwrap();
    stmt.query_map(params![record_id], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

pub(crate) fn image_column<T: rusqlite::types::FromSql>(
    path: &Path,
    record_id: i64,
    column: &str,
) -> Option<T> {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        &format!("SELECT {} FROM Adobe_images WHERE id_local = ?1", column),
        params![record_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub(crate) fn metadata_blob(path: &Path, record_id: i64) -> Option<String> {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        "SELECT externalEditingData FROM Adobe_additionalMetadata WHERE image = ?1",
        params![record_id],
        |row| row.get(0),
    )
    .optional()
    .unwrap()
}
