//! Line-oriented segmentation of page text into an outline tree.
//!
//! Heading lines carry dotted numeric identifiers ("1.1", "1.1.2",
//! "1.1.2.3"). Classification is by component count plus remainder shape:
//! a 3-component id with a heading-like remainder opens a subsection, while
//! the same id followed by a sentence is a recommendation (NG12 writes
//! recommendations as "1.1.1 Offer urgent referral ..."). Numbering gaps,
//! out-of-order ids and orphaned ids are recorded as anomalies, never
//! errors; the only fatal outcome is a document with no sections at all.

use crate::outline::{OutlineLevel, OutlineNode, PageText, UrgencyLevel};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Headings longer than this are treated as sentence text, not titles.
const MAX_TITLE_CHARS: usize = 60;

/// Dotted numeric identifier at line start, optional remainder.
const HEADING_PATTERN: &str = r"^(\d+(?:\.\d+)+)(?:\s+(.*))?$";

pub type SegmentResult<T> = Result<T, SegmentError>;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error(
        "no recognizable structure: scanned {pages} page(s) without finding a section header. \
         Expected lines like '1.1 Lung and pleural cancers'"
    )]
    NoSections { pages: usize },
}

/// A structural irregularity observed during segmentation. Non-fatal:
/// returned alongside the outline for the caller to inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutlineAnomaly {
    /// Sibling numbering skipped one or more values ("1.1.1" -> "1.1.3").
    NumberingGap {
        previous: String,
        found: String,
        page: u32,
    },
    /// Sibling numbering did not increase ("1.1.4" -> "1.1.2").
    OutOfOrder {
        previous: String,
        found: String,
        page: u32,
    },
    /// Identifier does not extend the enclosing node's identifier; the node
    /// is attached under it anyway.
    OrphanIdentifier {
        enclosing: String,
        found: String,
        page: u32,
    },
    /// Identifier with five or more components; treated as a recommendation.
    ExcessiveDepth { identifier: String, page: u32 },
}

impl fmt::Display for OutlineAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumberingGap {
                previous,
                found,
                page,
            } => write!(f, "numbering gap after {previous}: found {found} (page {page})"),
            Self::OutOfOrder {
                previous,
                found,
                page,
            } => write!(f, "out-of-order id after {previous}: found {found} (page {page})"),
            Self::OrphanIdentifier {
                enclosing,
                found,
                page,
            } => write!(f, "id {found} does not extend enclosing {enclosing} (page {page})"),
            Self::ExcessiveDepth { identifier, page } => {
                write!(f, "unexpectedly deep id {identifier} (page {page})")
            }
        }
    }
}

/// Segmentation result: the document root plus any anomalies observed.
#[derive(Debug, Clone)]
pub struct Outline {
    pub root: OutlineNode,
    pub anomalies: Vec<OutlineAnomaly>,
}

impl Outline {
    pub fn sections(&self) -> usize {
        self.root.count(OutlineLevel::Section)
    }

    pub fn subsections(&self) -> usize {
        self.root.count(OutlineLevel::Subsection)
    }

    pub fn recommendations(&self) -> usize {
        self.root.count(OutlineLevel::Recommendation)
    }

    /// Recommendations in an urgent tier (urgent and above).
    pub fn urgent_recommendations(&self) -> usize {
        self.root
            .count_at_least(OutlineLevel::Recommendation, UrgencyLevel::Urgent)
    }
}

/// Segments ordered page texts into an [`Outline`].
pub struct Segmenter {
    heading: Regex,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Classification of a single input line.
enum LineClass {
    Heading {
        level: OutlineLevel,
        identifier: String,
        title: String,
        excessive: bool,
    },
    Body,
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            heading: Regex::new(HEADING_PATTERN).expect("heading pattern is valid"),
        }
    }

    /// Build the outline for an ordered page sequence.
    ///
    /// Every input line is preserved verbatim on exactly one node (heading
    /// lines on the node they open, body lines on the deepest open node),
    /// so downstream chunking can reproduce the input text exactly.
    pub fn segment(&self, pages: &[PageText]) -> SegmentResult<Outline> {
        let mut builder = TreeBuilder::new(pages.first().map_or(1, |p| p.number));

        for page in pages {
            for line in page.text.split('\n') {
                match self.classify(line) {
                    LineClass::Heading {
                        level,
                        identifier,
                        title,
                        excessive,
                    } => {
                        debug!("detected {level} {identifier} on page {}", page.number);
                        if excessive {
                            builder.record(OutlineAnomaly::ExcessiveDepth {
                                identifier: identifier.clone(),
                                page: page.number,
                            });
                        }
                        builder.open(level, identifier, title, page.number, line.to_string());
                    }
                    LineClass::Body => builder.body(line),
                }
            }
        }

        builder.finish(pages.len())
    }

    fn classify(&self, line: &str) -> LineClass {
        let trimmed = line.trim();
        let Some(caps) = self.heading.captures(trimmed) else {
            return LineClass::Body;
        };

        let identifier = &caps[1];
        let title = caps.get(2).map_or("", |m| m.as_str().trim());
        let components = identifier.split('.').count();

        let (level, excessive) = match components {
            2 if is_title_like(title) => (OutlineLevel::Section, false),
            // A 2-component id followed by sentence text is usually a
            // quantity ("1.5 mg daily"), not a heading.
            2 => return LineClass::Body,
            3 if is_title_like(title) => (OutlineLevel::Subsection, false),
            3 => (OutlineLevel::Recommendation, false),
            4 => (OutlineLevel::Recommendation, false),
            _ => (OutlineLevel::Recommendation, true),
        };

        LineClass::Heading {
            level,
            identifier: identifier.to_string(),
            title: title.to_string(),
            excessive,
        }
    }
}

/// Short heading-shaped remainder: starts uppercase, bounded length, no
/// terminal sentence punctuation.
fn is_title_like(rest: &str) -> bool {
    if rest.is_empty() || rest.chars().count() > MAX_TITLE_CHARS {
        return false;
    }
    if !rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return false;
    }
    !rest.ends_with(['.', '!', '?'])
}

/// Numeric components of a dotted identifier.
fn id_components(identifier: &str) -> Vec<u64> {
    identifier
        .split('.')
        .map(|part| part.parse().unwrap_or(u64::MAX))
        .collect()
}

/// Open-node stack; nodes move into their parent's children when closed.
struct TreeBuilder {
    stack: Vec<OutlineNode>,
    anomalies: Vec<OutlineAnomaly>,
    sections_seen: usize,
}

impl TreeBuilder {
    fn new(first_page: u32) -> Self {
        let mut root = OutlineNode::root();
        root.page = first_page;
        Self {
            stack: vec![root],
            anomalies: Vec::new(),
            sections_seen: 0,
        }
    }

    fn record(&mut self, anomaly: OutlineAnomaly) {
        warn!("outline anomaly: {anomaly}");
        self.anomalies.push(anomaly);
    }

    fn open(
        &mut self,
        level: OutlineLevel,
        identifier: String,
        title: String,
        page: u32,
        heading_line: String,
    ) {
        self.close_to_depth(level.depth());
        self.check_placement(&identifier, page);

        if level == OutlineLevel::Section {
            self.sections_seen += 1;
        }
        self.stack
            .push(OutlineNode::open(level, identifier, title, page, heading_line));
    }

    fn body(&mut self, line: &str) {
        if let Some(top) = self.stack.last_mut() {
            top.body_lines.push(line.to_string());
        }
    }

    /// Close open nodes at `depth` or deeper. The root (depth 0) is never
    /// closed here.
    fn close_to_depth(&mut self, depth: u8) {
        while self.stack.len() > 1
            && self
                .stack
                .last()
                .is_some_and(|node| node.level.depth() >= depth)
        {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        if let Some(mut node) = self.stack.pop() {
            node.urgency = UrgencyLevel::detect(&node.full_text());
            if let Some(parent) = self.stack.last_mut() {
                parent.children.push(node);
            }
        }
    }

    /// Anomaly checks against the enclosing node and the previous sibling,
    /// run after ancestors have been closed.
    fn check_placement(&mut self, identifier: &str, page: u32) {
        let Some(parent) = self.stack.last() else {
            return;
        };
        let enclosing = parent.identifier.clone();
        let previous = parent.children.last().map(|node| node.identifier.clone());

        if !enclosing.is_empty() && !identifier.starts_with(&format!("{enclosing}.")) {
            self.record(OutlineAnomaly::OrphanIdentifier {
                enclosing,
                found: identifier.to_string(),
                page,
            });
        }

        if let Some(previous) = previous {
            let prev = id_components(&previous);
            let next = id_components(identifier);
            if next <= prev {
                self.record(OutlineAnomaly::OutOfOrder {
                    previous,
                    found: identifier.to_string(),
                    page,
                });
            } else if prev.len() == next.len()
                && prev[..prev.len() - 1] == next[..next.len() - 1]
                && next[next.len() - 1] > prev[prev.len() - 1] + 1
            {
                self.record(OutlineAnomaly::NumberingGap {
                    previous,
                    found: identifier.to_string(),
                    page,
                });
            }
        }
    }

    fn finish(mut self, pages: usize) -> SegmentResult<Outline> {
        if self.sections_seen == 0 {
            return Err(SegmentError::NoSections { pages });
        }

        self.close_to_depth(1);
        let mut root = self.stack.pop().unwrap_or_else(OutlineNode::root);
        root.urgency = UrgencyLevel::detect(&root.body_text());

        debug!(
            "segmented {pages} page(s): {} sections, {} subsections, {} recommendations, {} anomalies",
            root.count(OutlineLevel::Section),
            root.count(OutlineLevel::Subsection),
            root.count(OutlineLevel::Recommendation),
            self.anomalies.len()
        );

        Ok(Outline {
            root,
            anomalies: self.anomalies,
        })
    }
}
