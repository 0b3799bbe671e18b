//! Chunk assembly: outline tree to ordered retrieval units.

pub mod builder;
pub mod types;

pub use builder::{ChunkBuilder, ChunkingConfig, DEFAULT_LABEL};
pub use types::Chunk;
