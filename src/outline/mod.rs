//! Document segmentation: page texts to a hierarchical outline.
//!
//! The guideline numbers its structure with dotted identifiers (sections
//! "1.1", subsections "1.1.2", recommendations "1.1.1" / "1.1.2.3"). This
//! module classifies lines into that hierarchy, accumulates body text on
//! the deepest open node, detects referral urgency keywords, and reports
//! structural anomalies without failing.

pub mod node;
pub mod segmenter;
pub mod urgency;

pub use node::{OutlineLevel, OutlineNode, PageText};
pub use segmenter::{Outline, OutlineAnomaly, SegmentError, SegmentResult, Segmenter};
pub use urgency::UrgencyLevel;
