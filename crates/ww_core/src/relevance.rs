use chrono::{DateTime, Utc};

use crate::text::truncate_chars;
use crate::types::{Candidate, MAX_SUMMARY_CHARS};

pub const PRIMARY_KEYWORDS: &[&str] = &[
    "wastewater",
    "sewage",
    "water pollution",
    "effluent",
    "water contamination",
    "sewage overflow",
    "clean water act",
];

pub const SECONDARY_KEYWORDS: &[&str] = &[
    "treatment plant",
    "discharge",
    "violation",
    "pollution",
    "spill",
    "contamination",
    "environmental",
    "epa",
    "water quality",
];

const PRIMARY_WEIGHT: u32 = 3;
const SECONDARY_WEIGHT: u32 = 1;
const THRESHOLD: u32 = 3;

/// Weighted keyword filter for the wastewater beat.
///
/// Matching is plain substring search over the lower-cased `"{title} {summary}"`,
/// so "spill" also hits "spillover". Each keyword counts once.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    primary: Vec<String>,
    secondary: Vec<String>,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(PRIMARY_KEYWORDS, SECONDARY_KEYWORDS)
    }
}

impl RelevanceScorer {
    pub fn new(primary: &[&str], secondary: &[&str]) -> Self {
        Self {
            primary: primary.iter().map(|k| k.to_lowercase()).collect(),
            secondary: secondary.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn score(&self, title: &str, summary: &str) -> u32 {
        let text = format!("{} {}", title, summary).to_lowercase();
        let primary = self.primary.iter().filter(|k| text.contains(k.as_str())).count() as u32;
        let secondary = self.secondary.iter().filter(|k| text.contains(k.as_str())).count() as u32;
        primary * PRIMARY_WEIGHT + secondary * SECONDARY_WEIGHT
    }

    pub fn is_relevant(&self, title: &str, summary: &str) -> bool {
        self.score(title, summary) >= THRESHOLD
    }

    /// The only way sources build a [`Candidate`]: rejects blank titles or links and
    /// irrelevant text, and clips the summary.
    pub fn screen(
        &self,
        title: &str,
        url: &str,
        source: &str,
        summary: &str,
        published_at: Option<DateTime<Utc>>,
    ) -> Option<Candidate> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        if !self.is_relevant(title, summary) {
            return None;
        }
        Some(Candidate {
            title: title.to_string(),
            url: url.to_string(),
            source: source.to_string(),
            summary: truncate_chars(summary.trim(), MAX_SUMMARY_CHARS),
            published_at,
        })
    }
}
