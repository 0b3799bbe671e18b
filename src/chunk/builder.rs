//! Outline-to-chunk assembly.
//!
//! Walks the outline in document order, buffering each node's verbatim
//! lines as one atomic unit. A chunk closes once the buffer reaches the
//! target size at a subsection/recommendation boundary, seeding the next
//! buffer with the trailing lines of the closed chunk (~33% of target).
//! A new section always forces closure first and discards any pending
//! overlap, so chunks never cross sections. Units are never split, so a
//! recommendation longer than the target simply yields one oversized
//! chunk.

use crate::chunk::Chunk;
use crate::outline::{Outline, OutlineLevel, OutlineNode, UrgencyLevel};
use serde::{Deserialize, Serialize};

/// Default chunk id prefix.
pub const DEFAULT_LABEL: &str = "ng12";

/// Sizing policy for chunk assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Close a chunk once the buffer reaches this many characters
    /// (~500 tokens at ~4 chars per token).
    pub target_chars: usize,

    /// Budget for the overlap seeded into the next chunk; whole trailing
    /// lines are taken while they fit.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: 2000,
            overlap_chars: 660,
        }
    }
}

/// Builds ordered [`Chunk`]s from an outline.
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    config: ChunkingConfig,
    label: String,
}

impl Default for ChunkBuilder {
    fn default() -> Self {
        Self::new(ChunkingConfig::default(), DEFAULT_LABEL)
    }
}

impl ChunkBuilder {
    pub fn new(config: ChunkingConfig, label: impl Into<String>) -> Self {
        Self {
            config,
            label: label.into(),
        }
    }

    /// Assemble chunks covering the outline's text exactly once in primary
    /// content.
    pub fn build(&self, outline: &Outline) -> Vec<Chunk> {
        let units = flatten(&outline.root);

        let mut assembler = Assembler::new(&self.config, &self.label);
        for unit in &units {
            assembler.push(unit);
        }
        assembler.finish()
    }
}

/// One node's contribution, appended to the buffer atomically: its heading
/// line (if any) followed by its body lines, with the identifiers open at
/// that point.
struct Unit<'a> {
    level: OutlineLevel,
    page: u32,
    section: Option<&'a str>,
    subsection: Option<&'a str>,
    recommendation: Option<&'a str>,
    lines: Vec<&'a str>,
}

/// Flatten the tree into document-order units.
fn flatten(root: &OutlineNode) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    visit(root, None, None, &mut units);
    units
}

fn visit<'a>(
    node: &'a OutlineNode,
    section: Option<&'a str>,
    subsection: Option<&'a str>,
    out: &mut Vec<Unit<'a>>,
) {
    let (section, subsection, recommendation) = match node.level {
        OutlineLevel::Document => (None, None, None),
        OutlineLevel::Section => (Some(node.identifier.as_str()), None, None),
        OutlineLevel::Subsection => (section, Some(node.identifier.as_str()), None),
        OutlineLevel::Recommendation => (section, subsection, Some(node.identifier.as_str())),
    };

    let mut lines: Vec<&str> = Vec::with_capacity(node.body_lines.len() + 1);
    if let Some(heading) = &node.heading_line {
        lines.push(heading);
    }
    lines.extend(node.body_lines.iter().map(String::as_str));

    // Only the root can be line-less (no heading, empty preamble).
    if !lines.is_empty() {
        out.push(Unit {
            level: node.level,
            page: node.page,
            section,
            subsection,
            recommendation,
            lines,
        });
    }

    for child in &node.children {
        visit(child, section, subsection, out);
    }
}

/// Identifiers carried by the most recently appended unit.
#[derive(Default, Clone)]
struct BoundaryIds {
    section: Option<String>,
    subsection: Option<String>,
    recommendation: Option<String>,
}

struct Assembler<'a> {
    config: &'a ChunkingConfig,
    label: &'a str,
    chunks: Vec<Chunk>,
    /// Buffered lines; the first `overlap_lines` are seeded overlap.
    buffer: Vec<String>,
    buffer_chars: usize,
    overlap_lines: usize,
    overlap_chars: usize,
    first_primary_page: Option<u32>,
    last_ids: BoundaryIds,
    seq: u32,
}

impl<'a> Assembler<'a> {
    fn new(config: &'a ChunkingConfig, label: &'a str) -> Self {
        Self {
            config,
            label,
            chunks: Vec::new(),
            buffer: Vec::new(),
            buffer_chars: 0,
            overlap_lines: 0,
            overlap_chars: 0,
            first_primary_page: None,
            last_ids: BoundaryIds::default(),
            seq: 0,
        }
    }

    fn push(&mut self, unit: &Unit<'_>) {
        if unit.level == OutlineLevel::Section {
            // Chunks never cross a section boundary; pending overlap from
            // the previous section is discarded with it.
            self.close(false);
        }

        if self.first_primary_page.is_none() {
            self.first_primary_page = Some(unit.page);
        }
        for line in &unit.lines {
            self.push_line(line);
        }
        self.last_ids = BoundaryIds {
            section: unit.section.map(str::to_string),
            subsection: unit.subsection.map(str::to_string),
            recommendation: unit.recommendation.map(str::to_string),
        };

        if self.buffer_chars >= self.config.target_chars
            && matches!(
                unit.level,
                OutlineLevel::Subsection | OutlineLevel::Recommendation
            )
        {
            self.close(true);
        }
    }

    fn push_line(&mut self, line: &str) {
        if !self.buffer.is_empty() {
            self.buffer_chars += 1; // joining newline
        }
        self.buffer_chars += line.chars().count();
        self.buffer.push(line.to_string());
    }

    /// Close the buffered chunk. With `seed_overlap`, trailing whole lines
    /// up to the overlap budget start the next buffer.
    fn close(&mut self, seed_overlap: bool) {
        let has_primary = self.buffer.len() > self.overlap_lines;
        if !has_primary {
            // Stale overlap with nothing new behind it; emit nothing.
            self.reset_buffer();
            return;
        }

        let text = self.buffer.join("\n");
        let page = self.first_primary_page.unwrap_or(1);
        let chunk = Chunk {
            id: format!("{}_p{}_c{}", self.label, page, self.seq),
            seq: self.seq,
            page,
            overlap_chars: self.overlap_chars,
            section: self.last_ids.section.clone(),
            subsection: self.last_ids.subsection.clone(),
            recommendation_id: self.last_ids.recommendation.clone(),
            urgency: UrgencyLevel::detect(&text),
            text,
        };
        self.seq += 1;

        let seed = if seed_overlap {
            let count = trailing_lines_within(&self.buffer, self.config.overlap_chars);
            self.buffer.split_off(self.buffer.len() - count)
        } else {
            Vec::new()
        };

        self.chunks.push(chunk);
        self.reset_buffer();

        if !seed.is_empty() {
            self.overlap_lines = seed.len();
            self.overlap_chars = seed.iter().map(|l| l.chars().count() + 1).sum();
            self.buffer_chars = self.overlap_chars - 1;
            self.buffer = seed;
        }
    }

    fn reset_buffer(&mut self) {
        self.buffer.clear();
        self.buffer_chars = 0;
        self.overlap_lines = 0;
        self.overlap_chars = 0;
        self.first_primary_page = None;
    }

    fn finish(mut self) -> Vec<Chunk> {
        // Trailing chunk keeps whatever is buffered, however short.
        self.close(false);
        self.chunks
    }
}

/// How many trailing lines fit in `budget` chars (each line costs its
/// length plus a newline). May be zero when the last line alone is too
/// long.
fn trailing_lines_within(lines: &[String], budget: usize) -> usize {
    let mut total = 0;
    let mut count = 0;
    for line in lines.iter().rev() {
        let cost = line.chars().count() + 1;
        if total + cost > budget {
            break;
        }
        total += cost;
        count += 1;
    }
    count
}
