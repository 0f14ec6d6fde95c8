use std::cmp::Ordering;
use std::path::{Path, PathBuf};

const HIGH_SUFFIXES: &[&str] = &["_3202", "_3200", "_3951", "_3199"];
const MEDIUM_SUFFIXES: &[&str] = &["_1601", "_1600", "_1975", "_1599"];
const LOW_SUFFIXES: &[&str] = &["_800", "_799", "_987"];

/// Apparent resolution tier of a preview file, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionRank {
    Unknown,
    Low,
    Medium,
    High,
}

impl ResolutionRank {
    pub fn from_file_name(name: &str) -> Self {
        let matches = |suffixes: &[&str]| suffixes.iter().any(|s| name.contains(s));
        if matches(HIGH_SUFFIXES) {
            Self::High
        } else if matches(MEDIUM_SUFFIXES) {
            Self::Medium
        } else if matches(LOW_SUFFIXES) {
            Self::Low
        } else {
            Self::Unknown
        }
    }

    pub fn score(self) -> u8 {
        self as u8
    }
}

pub fn rank_path(path: &Path) -> ResolutionRank {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(ResolutionRank::from_file_name)
        .unwrap_or(ResolutionRank::Unknown)
}

/// Orders candidates best-first: higher rank, then lexicographically smaller path.
fn compare_candidates(a: &Path, b: &Path) -> Ordering {
    rank_path(b).cmp(&rank_path(a)).then_with(|| a.cmp(b))
}

/// Picks the best candidate regardless of the order candidates arrive in.
pub fn best_candidate<'a, I>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    candidates
        .into_iter()
        .min_by(|a, b| compare_candidates(a, b))
        .cloned()
}
