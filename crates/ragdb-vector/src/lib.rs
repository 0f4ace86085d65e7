//! Index loading, pairing checks, single-index retrieval and the turn-scoped
//! embedding cache.

pub mod artifact;
pub mod cache;
pub mod catalog;
pub mod collection;
pub mod index;
pub mod integrity;
pub mod metadata;
pub mod metric;
pub mod retriever;

pub use cache::{content_hash, CacheStats, EmbeddingCache};
pub use catalog::IndexCatalog;
pub use collection::Collection;
pub use index::FlatIndex;
pub use metadata::MetadataStore;
pub use metric::Metric;
pub use retriever::Retriever;
