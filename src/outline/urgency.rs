//! Referral urgency tiers and keyword detection.
//!
//! The guideline marks recommendations with a small fixed vocabulary
//! ("urgent referral", "suspected cancer pathway", ...). Detection is a
//! case-insensitive substring scan; negated and longer phrases are matched
//! first and mask their span so "non-urgent" is never also counted as
//! "urgent".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency tier of a guideline passage, ordered by ascending precedence.
///
/// `Ord` follows the referral precedence used for ranking: `VeryUrgent`
/// outranks `SuspectedCancer`, which outranks `Urgent`, and so on down to
/// `None`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    #[default]
    None,
    Consider,
    NonUrgent,
    DirectAccess,
    Urgent,
    SuspectedCancer,
    VeryUrgent,
}

/// Keyword table in scan order. A phrase must be scanned before any phrase
/// it can overlap in text: "very urgent referral" before "urgent", and
/// "non-urgent" before "urgent referral", which would otherwise match
/// inside "non-urgent referral".
const KEYWORDS: &[(&str, UrgencyLevel)] = &[
    ("suspected cancer pathway", UrgencyLevel::SuspectedCancer),
    ("very urgent referral", UrgencyLevel::VeryUrgent),
    ("non-urgent", UrgencyLevel::NonUrgent),
    ("urgent referral", UrgencyLevel::Urgent),
    ("direct access", UrgencyLevel::DirectAccess),
    ("very urgent", UrgencyLevel::VeryUrgent),
    ("consider", UrgencyLevel::Consider),
    ("urgent", UrgencyLevel::Urgent),
];

impl UrgencyLevel {
    /// Scan `text` for urgency keywords and return the highest-precedence
    /// tier found, or `None` when nothing matches.
    pub fn detect(text: &str) -> Self {
        let mut haystack = text.to_lowercase();
        let mut best = Self::None;

        for (phrase, tier) in KEYWORDS {
            let mut from = 0;
            while let Some(offset) = haystack[from..].find(phrase) {
                let start = from + offset;
                let end = start + phrase.len();
                // Phrases are ASCII, so masking in place keeps byte offsets
                // stable for the remaining passes.
                haystack.replace_range(start..end, &"\u{0}".repeat(phrase.len()));
                best = best.max(*tier);
                from = end;
            }
        }

        best
    }

    /// Snake_case form used in the persisted index.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Consider => "consider",
            Self::NonUrgent => "non_urgent",
            Self::DirectAccess => "direct_access",
            Self::Urgent => "urgent",
            Self::SuspectedCancer => "suspected_cancer",
            Self::VeryUrgent => "very_urgent",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "consider" => Some(Self::Consider),
            "non_urgent" => Some(Self::NonUrgent),
            "direct_access" => Some(Self::DirectAccess),
            "urgent" => Some(Self::Urgent),
            "suspected_cancer" => Some(Self::SuspectedCancer),
            "very_urgent" => Some(Self::VeryUrgent),
            _ => None,
        }
    }

    /// True for the three tiers that warrant an urgent-pathway referral:
    /// `Urgent`, `SuspectedCancer`, `VeryUrgent`.
    pub fn is_urgent_tier(&self) -> bool {
        matches!(self, Self::Urgent | Self::SuspectedCancer | Self::VeryUrgent)
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
