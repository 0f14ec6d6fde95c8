//! Marker-delimited caption sections.
//!
//! A caption is treated as paragraphs separated by blank lines. Each section
//! written here is one paragraph opening with a fixed marker, so a later run
//! can find and replace exactly the paragraph it wrote before.

use std::collections::BTreeMap;

pub const SCORE_MARKER: &str = "AI Aesthetic Score:";
pub const FILM_MARKER: &str = "FILM ANALYSIS:";
pub const CATEGORIES_MARKER: &str = "Categories:";

/// Film category keys and their caption labels, in caption order.
pub const FILM_FIELDS: &[(&str, &str)] = &[
    ("film_format", "Film Format"),
    ("film_characteristics", "Film Characteristics"),
    ("lens_characteristics", "Lens Characteristics"),
    ("focal_length_estimate", "Focal Length"),
    ("aperture_evidence", "Aperture/DOF"),
];

pub const STANDARD_CATEGORIES: &[&str] = &[
    "content_type",
    "main_subject",
    "lighting",
    "color",
    "mood",
    "style",
];

const PARAGRAPH_BREAK: &str = "\n\n";

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSections {
    pub score: String,
    pub film: Option<String>,
    pub categories: Option<String>,
}

/// `content_type` → `Content Type`.
pub fn display_name(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn build_sections(score: f64, categories: &BTreeMap<String, Vec<String>>) -> CaptionSections {
    let non_empty = |key: &str| categories.get(key).filter(|v| !v.is_empty());

    let film_lines: Vec<String> = FILM_FIELDS
        .iter()
        .filter_map(|&(key, label)| non_empty(key).map(|v| format!("{}: {}", label, v.join(", "))))
        .collect();

    let category_lines: Vec<String> = STANDARD_CATEGORIES
        .iter()
        .filter_map(|&key| non_empty(key).map(|v| format!("{}: {}", display_name(key), v.join(", "))))
        .collect();

    CaptionSections {
        score: format!("{} {:.1}/10", SCORE_MARKER, score),
        film: (!film_lines.is_empty())
            .then(|| format!("{}\n{}", FILM_MARKER, film_lines.join("\n"))),
        categories: (!category_lines.is_empty())
            .then(|| format!("{}\n{}", CATEGORIES_MARKER, category_lines.join("\n"))),
    }
}

/// Replaces, removes or appends each marker section inside `existing`.
pub fn merge_caption(existing: Option<&str>, sections: &CaptionSections) -> String {
    let mut paragraphs: Vec<String> = existing
        .unwrap_or_default()
        .split(PARAGRAPH_BREAK)
        .map(|p| p.trim_matches('\n').to_string())
        .filter(|p| !p.trim().is_empty())
        .collect();

    let updates = [
        (SCORE_MARKER, Some(sections.score.as_str())),
        (FILM_MARKER, sections.film.as_deref()),
        (CATEGORIES_MARKER, sections.categories.as_deref()),
    ];

    for (marker, replacement) in updates {
        let position = paragraphs
            .iter()
            .position(|p| p.trim_start().starts_with(marker));
        match (position, replacement) {
            (Some(i), Some(text)) => paragraphs[i] = text.to_string(),
            (Some(i), None) => {
                paragraphs.remove(i);
            }
            (None, Some(text)) => paragraphs.push(text.to_string()),
            (None, None) => {}
        }
    }

    paragraphs.join(PARAGRAPH_BREAK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(pairs: Vec<(&str, Vec<&str>)>) -> BTreeMap<String, Vec<String>> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into_iter().map(str::to_string).collect()))
            .collect()
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("content_type"), "Content Type");
        assert_eq!(display_name("mood"), "Mood");
    }

    #[test]
    fn test_build_sections() {
        let sections = build_sections(
            7.26,
            &categories(vec![("film_format", vec!["35mm"]), ("mood", vec!["calm", "quiet"])]),
        );
        assert_eq!(sections.score, "AI Aesthetic Score: 7.3/10");
        assert_eq!(sections.film.as_deref(), Some("FILM ANALYSIS:\nFilm Format: 35mm"));
        assert_eq!(sections.categories.as_deref(), Some("Categories:\nMood: calm, quiet"));
    }

    #[test]
    fn test_merge_into_empty_caption() {
        let sections = build_sections(6.0, &categories(vec![("style", vec!["documentary"])]));
        let caption = merge_caption(None, &sections);
        assert_eq!(
            caption,
            "AI Aesthetic Score: 6.0/10\n\nCategories:\nStyle: documentary"
        );
    }

    #[test]
    fn test_merge_appends_after_user_text() {
        let sections = build_sections(5.0, &BTreeMap::new());
        let caption = merge_caption(Some("Grandma's garden, 1987"), &sections);
        assert_eq!(caption, "Grandma's garden, 1987\n\nAI Aesthetic Score: 5.0/10");
    }

    #[test]
    fn test_merge_replaces_previous_sections() {
        let first = merge_caption(
            Some("Trip notes"),
            &build_sections(4.0, &categories(vec![("film_format", vec!["120"]), ("mood", vec!["dark"])])),
        );
        let second = merge_caption(
            Some(&first),
            &build_sections(8.0, &categories(vec![("mood", vec!["bright"])])),
        );

        assert_eq!(
            second,
            "Trip notes\n\nAI Aesthetic Score: 8.0/10\n\nCategories:\nMood: bright"
        );
        assert_eq!(second.matches(SCORE_MARKER).count(), 1);
        assert!(!second.contains(FILM_MARKER));
    }
}
