//! Retrieval chunk type and its derived accessors.

use crate::outline::UrgencyLevel;
use serde::{Deserialize, Serialize};

/// A bounded span of guideline text, the unit of retrieval.
///
/// `text` may begin with content carried over from the previous chunk;
/// `overlap_chars` marks how much, and [`primary_text`](Self::primary_text)
/// excludes it. Chunks are created once at ingestion and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id: `{label}_p{page}_c{seq}`.
    pub id: String,

    /// Global 0-based position in document order.
    pub seq: u32,

    /// 1-indexed page of the first primary (non-overlap) line.
    pub page: u32,

    /// Chunk content, overlap prefix included.
    pub text: String,

    /// Char length of the overlap prefix; 0 for the first chunk and after
    /// section breaks.
    pub overlap_chars: usize,

    /// Section identifier most specific to the boundary that closed this
    /// chunk (e.g. "1.1"), when inside one.
    pub section: Option<String>,

    /// Subsection identifier (e.g. "1.1.2"), when inside one.
    pub subsection: Option<String>,

    /// Recommendation identifier (e.g. "1.1.1"), when the closing boundary
    /// was a recommendation.
    pub recommendation_id: Option<String>,

    /// Highest-precedence urgency keyword found in `text`.
    pub urgency: UrgencyLevel,
}

impl Chunk {
    /// Content without the carried-over overlap prefix.
    pub fn primary_text(&self) -> &str {
        if self.overlap_chars == 0 {
            return &self.text;
        }
        match self.text.char_indices().nth(self.overlap_chars) {
            Some((byte_index, _)) => &self.text[byte_index..],
            None => "",
        }
    }

    /// User-facing citation: `[NG12 Rec 1.1.1, p.5]` for recommendation
    /// chunks, `[NG12 p.5]` otherwise.
    pub fn citation(&self, label: &str) -> String {
        match &self.recommendation_id {
            Some(rec) => format!("[{label} Rec {rec}, p.{}]", self.page),
            None => format!("[{label} p.{}]", self.page),
        }
    }

    /// First N characters of the content, cut at a safe UTF-8 boundary.
    pub fn preview(&self, max_chars: usize) -> &str {
        if self.text.len() <= max_chars {
            &self.text
        } else {
            let mut end = max_chars;
            while end > 0 && !self.text.is_char_boundary(end) {
                end -= 1;
            }
            &self.text[..end]
        }
    }

    /// Content length in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, overlap_chars: usize) -> Chunk {
        Chunk {
            id: "ng12_p1_c0".to_string(),
            seq: 0,
            page: 1,
            text: text.to_string(),
            overlap_chars,
            section: Some("1.1".to_string()),
            subsection: None,
            recommendation_id: None,
            urgency: UrgencyLevel::None,
        }
    }

    #[test]
    fn test_primary_text_skips_overlap() {
        let c = chunk("carried\nfresh content", 8);
        assert_eq!(c.primary_text(), "fresh content");

        let no_overlap = chunk("all fresh", 0);
        assert_eq!(no_overlap.primary_text(), "all fresh");
    }

    #[test]
    fn test_primary_text_counts_chars_not_bytes() {
        // "é" is 2 bytes but 1 char; the overlap span is chars.
        let c = chunk("éé\nrest", 3);
        assert_eq!(c.primary_text(), "rest");
    }

    #[test]
    fn test_citation_forms() {
        let mut c = chunk("text", 0);
        assert_eq!(c.citation("NG12"), "[NG12 p.1]");

        c.recommendation_id = Some("1.1.1".to_string());
        assert_eq!(c.citation("NG12"), "[NG12 Rec 1.1.1, p.1]");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let c = chunk("héllo world", 6);
        // Byte 2 falls inside the two-byte "é"; preview must back up.
        assert_eq!(c.preview(2), "h");
        assert_eq!(c.preview(100), "héllo world");
    }
}
