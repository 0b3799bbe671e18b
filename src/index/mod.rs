//! Guideline index storage and retrieval primitives.

pub mod schema;
pub mod store;

pub use schema::GuidelineSchema;
pub use store::{
    BuildProgress, GuidelineIndex, INDEX_FORMAT_VERSION, IndexError, IndexMeta, IndexResult,
    IndexStatistics, SearchHit,
};
