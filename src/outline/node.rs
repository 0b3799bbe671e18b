//! Outline tree types produced by segmentation.

use crate::outline::UrgencyLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One input page: 1-indexed page number plus its raw extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Hierarchy level of an outline node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineLevel {
    Document,
    Section,
    Subsection,
    Recommendation,
}

impl OutlineLevel {
    /// Depth in the open-node stack: the document root is 0, a
    /// recommendation 3. A new node closes every open node at depth >= its
    /// own before attaching.
    pub fn depth(&self) -> u8 {
        match self {
            Self::Document => 0,
            Self::Section => 1,
            Self::Subsection => 2,
            Self::Recommendation => 3,
        }
    }
}

impl fmt::Display for OutlineLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Section => "section",
            Self::Subsection => "subsection",
            Self::Recommendation => "recommendation",
        };
        write!(f, "{name}")
    }
}

/// A detected heading or recommendation, with the text that follows it.
///
/// `heading_line` and `body_lines` keep the source lines verbatim so chunk
/// assembly can reproduce the input text exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineNode {
    pub level: OutlineLevel,

    /// Dotted numeric identifier ("1.1.2"); empty for the document root.
    pub identifier: String,

    /// Heading remainder after the identifier. May be empty (bare ids) or a
    /// full sentence (NG12 recommendations carry their text on the heading
    /// line).
    pub title: String,

    /// 1-indexed page where the node opened.
    pub page: u32,

    /// The source line verbatim; `None` for the document root.
    pub heading_line: Option<String>,

    /// Source lines accumulated under this node before its first child
    /// opened, verbatim.
    pub body_lines: Vec<String>,

    /// Highest-precedence urgency keyword found in title + body, finalized
    /// when the node closes.
    pub urgency: UrgencyLevel,

    /// Child nodes in document order.
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// The document root: no identifier, no heading line.
    pub fn root() -> Self {
        Self {
            level: OutlineLevel::Document,
            identifier: String::new(),
            title: String::new(),
            page: 1,
            heading_line: None,
            body_lines: Vec::new(),
            urgency: UrgencyLevel::None,
            children: Vec::new(),
        }
    }

    pub(crate) fn open(
        level: OutlineLevel,
        identifier: String,
        title: String,
        page: u32,
        heading_line: String,
    ) -> Self {
        Self {
            level,
            identifier,
            title,
            page,
            heading_line: Some(heading_line),
            body_lines: Vec::new(),
            urgency: UrgencyLevel::None,
            children: Vec::new(),
        }
    }

    /// Body lines joined with newlines.
    pub fn body_text(&self) -> String {
        self.body_lines.join("\n")
    }

    /// Title plus body, the basis for urgency detection. A recommendation's
    /// sentence lives in its title, so scanning body alone would miss it.
    pub fn full_text(&self) -> String {
        if self.title.is_empty() {
            self.body_text()
        } else if self.body_lines.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body_text())
        }
    }

    /// Count descendant nodes (excluding self) at the given level.
    pub fn count(&self, level: OutlineLevel) -> usize {
        self.children
            .iter()
            .map(|child| usize::from(child.level == level) + child.count(level))
            .sum()
    }

    /// Count descendant nodes at the given level whose urgency is at or
    /// above `floor`.
    pub fn count_at_least(&self, level: OutlineLevel, floor: UrgencyLevel) -> usize {
        self.children
            .iter()
            .map(|child| {
                usize::from(child.level == level && child.urgency >= floor)
                    + child.count_at_least(level, floor)
            })
            .sum()
    }

    /// Find a descendant by identifier (depth-first).
    pub fn find(&self, identifier: &str) -> Option<&OutlineNode> {
        for child in &self.children {
            if child.identifier == identifier {
                return Some(child);
            }
            if let Some(found) = child.find(identifier) {
                return Some(found);
            }
        }
        None
    }
}
