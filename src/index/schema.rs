//! Tantivy schema for indexed guideline chunks.
//!
//! Chunk text is stored for retrieval but not tokenized; ranking comes
//! from the embedding sidecar, and tantivy serves exact-term filters on
//! the outline metadata.

use tantivy::schema::{Field, NumericOptions, STORED, STRING, Schema, SchemaBuilder};

/// Schema fields for guideline chunk storage.
#[derive(Debug)]
pub struct GuidelineSchema {
    /// Human-readable chunk identifier (e.g. `ng12_p4_c7`).
    pub chunk_id: Field,

    /// Zero-based position of the chunk in document order. Joins a chunk
    /// to its embedding in the sidecar file.
    pub seq: Field,

    /// Page the chunk's own content starts on.
    pub page: Field,

    /// Full chunk text, overlap prefix included.
    pub text: Field,

    /// Length in characters of the overlap prefix carried from the
    /// previous chunk.
    pub overlap_chars: Field,

    /// Enclosing section identifier (e.g. `1.1`), when known.
    pub section: Field,

    /// Enclosing subsection identifier, when known.
    pub subsection: Field,

    /// Identifier of the recommendation the chunk ends in, when known.
    pub recommendation_id: Field,

    /// Urgency tier name for the chunk.
    pub urgency: Field,
}

impl GuidelineSchema {
    /// Build the schema for guideline chunk storage.
    pub fn build() -> (Schema, Self) {
        let mut builder = SchemaBuilder::default();

        // Chunk ID - STRING for exact lookup
        let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);

        // Sequence number - indexed for seq lookups, fast for sorting
        let indexed_u64 = NumericOptions::default()
            .set_indexed()
            .set_stored()
            .set_fast();
        let seq = builder.add_u64_field("seq", indexed_u64);

        // Page number and overlap length - stored only
        let page = builder.add_u64_field("page", STORED);
        let overlap_chars = builder.add_u64_field("overlap_chars", STORED);

        // Chunk text - stored only, never tokenized
        let text = builder.add_text_field("text", STORED);

        // Outline identifiers - STRING for exact filtering
        let section = builder.add_text_field("section", STRING | STORED);
        let subsection = builder.add_text_field("subsection", STRING | STORED);
        let recommendation_id = builder.add_text_field("recommendation_id", STRING | STORED);

        // Urgency tier - STRING for exact filtering
        let urgency = builder.add_text_field("urgency", STRING | STORED);

        let schema = builder.build();

        let guideline_schema = Self {
            chunk_id,
            seq,
            page,
            text,
            overlap_chars,
            section,
            subsection,
            recommendation_id,
            urgency,
        };

        (schema, guideline_schema)
    }
}
