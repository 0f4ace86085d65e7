//! Shared types, errors, configuration and seams for the ragdb retrieval engine.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Record, RetrievalRequest, SearchResult, UnitVector};
