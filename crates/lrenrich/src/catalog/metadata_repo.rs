//! Writes analysis results back into the catalog.
//!
//! [`write_metadata`] performs four sub-writes (keywords, rating, caption and
//! the JSON blob) on the connection it is given. Callers run it inside one
//! transaction so they apply together or not at all.

use std::collections::{BTreeMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::caption::{build_sections, display_name, merge_caption, STANDARD_CATEGORIES};
use super::record_repo::PROCESSED_KEYWORD;
use super::{CatalogSchema, DatabaseError};
use crate::analyzer::AnalysisMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordOptions {
    pub hierarchical: bool,
    pub delimiter: String,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self {
            hierarchical: false,
            delimiter: "|".to_string(),
        }
    }
}

/// Keyword names to link, deduplicated case-insensitively in first-seen order.
pub fn collect_keywords(metadata: &AnalysisMetadata, options: &KeywordOptions) -> Vec<String> {
    let mut names: Vec<String> = metadata
        .keywords
        .iter()
        .chain(metadata.tags.iter())
        .cloned()
        .collect();
    names.push(PROCESSED_KEYWORD.to_string());
    names.push(format!("AI_Score_{:.1}", metadata.aesthetic_score));

    if options.hierarchical {
        names.extend(hierarchical_keywords(&metadata.categories, &options.delimiter));
    }

    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.to_lowercase()))
        .collect()
}

fn hierarchical_keywords(categories: &BTreeMap<String, Vec<String>>, d: &str) -> Vec<String> {
    let values = |key: &str| categories.get(key).map(Vec::as_slice).unwrap_or(&[]);
    let mut out = Vec::new();

    if let Some(format) = values("film_format").first() {
        out.push(format!("Film{d}Format{d}{format}"));
    }
    for v in values("film_characteristics") {
        out.push(format!("Film{d}Characteristics{d}{v}"));
    }

    let lens = values("lens_characteristics");
    if !lens.is_empty() {
        out.push("Lens".to_string());
        out.extend(lens.iter().map(|v| format!("Lens{d}{v}")));
    }
    for v in values("focal_length_estimate") {
        out.push(format!("Lens{d}FocalLength{d}{v}"));
    }
    for v in values("aperture_evidence") {
        out.push(format!("Lens{d}Aperture{d}{v}"));
    }

    for &key in STANDARD_CATEGORIES {
        let entries = values(key);
        if entries.is_empty() {
            continue;
        }
        let parent = display_name(key);
        out.extend(entries.iter().map(|v| format!("{parent}{d}{v}")));
        out.push(parent);
    }
    out
}

fn keyword_id(conn: &Connection, name: &str) -> Result<i64, rusqlite::Error> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id_local FROM AgLibraryKeyword WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let global_id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    conn.execute(
        "INSERT INTO AgLibraryKeyword (name, lc_name, includeOnExport, id_global)
         VALUES (?1, ?2, 1, ?3)",
        params![name, name.to_lowercase(), global_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Links every keyword to the record, creating missing keywords. Returns the
/// number of new links.
fn write_keywords(
    conn: &Connection,
    schema: &CatalogSchema,
    record_id: i64,
    keywords: &[String],
) -> Result<usize, rusqlite::Error> {
    if !schema.has_table("AgLibraryKeyword") || !schema.has_table("AgLibraryKeywordImage") {
        warn!(record_id, "Keyword tables missing, keywords not written");
        return Ok(0);
    }

    let mut linked = 0;
    for name in keywords {
        let tag = keyword_id(conn, name)?;
        linked += conn.execute(
            "INSERT INTO AgLibraryKeywordImage (image, tag)
             SELECT ?1, ?2
             WHERE NOT EXISTS (SELECT 1 FROM AgLibraryKeywordImage WHERE image = ?1 AND tag = ?2)",
            params![record_id, tag],
        )?;
    }
    Ok(linked)
}

/// Halves round to the even star, so 5.0 rates 2 and 7.0 rates 4.
fn star_rating(score: f64) -> i64 {
    ((score / 2.0).round_ties_even() as i64).clamp(0, 5)
}

/// Sets a star rating only where the user has not rated the photo.
fn write_rating(
    conn: &Connection,
    schema: &CatalogSchema,
    record_id: i64,
    score: f64,
) -> Result<bool, rusqlite::Error> {
    if !schema.has_column("Adobe_images", "rating") {
        return Ok(false);
    }
    let current: Option<Option<f64>> = conn
        .query_row(
            "SELECT rating FROM Adobe_images WHERE id_local = ?1",
            params![record_id],
            |row| row.get(0),
        )
        .optional()?;

    match current {
        Some(None) => {}
        Some(Some(rating)) if rating == 0.0 => {}
        _ => return Ok(false),
    }
    conn.execute(
        "UPDATE Adobe_images SET rating = ?1 WHERE id_local = ?2",
        params![star_rating(score), record_id],
    )?;
    Ok(true)
}

fn write_caption(
    conn: &Connection,
    schema: &CatalogSchema,
    record_id: i64,
    metadata: &AnalysisMetadata,
) -> Result<bool, rusqlite::Error> {
    if metadata.categories.is_empty() || !schema.has_column("Adobe_images", "caption") {
        return Ok(false);
    }
    let existing: Option<String> = conn
        .query_row(
            "SELECT caption FROM Adobe_images WHERE id_local = ?1",
            params![record_id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    let sections = build_sections(metadata.aesthetic_score, &metadata.categories);
    let caption = merge_caption(existing.as_deref(), &sections);
    conn.execute(
        "UPDATE Adobe_images SET caption = ?1 WHERE id_local = ?2",
        params![caption, record_id],
    )?;
    Ok(true)
}

fn write_blob(
    conn: &Connection,
    schema: &CatalogSchema,
    record_id: i64,
    metadata: &AnalysisMetadata,
) -> Result<bool, DatabaseError> {
    if !schema.has_table("Adobe_additionalMetadata") {
        return Ok(false);
    }
    let json = serde_json::to_string(metadata)?;

    let updated = conn.execute(
        "UPDATE Adobe_additionalMetadata SET externalEditingData = ?1 WHERE image = ?2",
        params![json, record_id],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO Adobe_additionalMetadata (image, externalEditingData) VALUES (?1, ?2)",
            params![record_id, json],
        )?;
    }
    Ok(true)
}

/// Applies all four metadata sub-writes for one record.
pub fn write_metadata(
    conn: &Connection,
    schema: &CatalogSchema,
    record_id: i64,
    metadata: &AnalysisMetadata,
    options: &KeywordOptions,
) -> Result<(), DatabaseError> {
    let keywords = collect_keywords(metadata, options);
    let linked = write_keywords(conn, schema, record_id, &keywords)?;
    let rated = write_rating(conn, schema, record_id, metadata.aesthetic_score)?;
    let captioned = write_caption(conn, schema, record_id, metadata)?;
    let blob = write_blob(conn, schema, record_id, metadata)?;

    debug!(
        record_id,
        keywords = keywords.len(),
        linked,
        rated,
        captioned,
        blob,
        "Metadata written"
    );
    Ok(())
}
