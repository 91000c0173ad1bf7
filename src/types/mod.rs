pub mod context;
pub mod predicate;
pub mod summary;

pub use context::{
    AssembledContexts, CitationTag, ContextGroup, ContextItem, FilterGroup, GroupName, GroupRole,
    ReferenceIndex,
};
pub use predicate::{ChunkMetadata, KbType, MetadataField, MetadataPredicate};
pub use summary::{StructuredSummary, SummaryBullet};
