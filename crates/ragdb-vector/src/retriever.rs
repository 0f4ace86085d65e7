//! Single-index similarity search with over-sampling and a relevance floor.

use tracing::debug;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::traits::VectorIndex;
use ragdb_core::types::{SearchResult, UnitVector};
use ragdb_core::{Error, Result};

use crate::catalog::IndexCatalog;
use crate::collection::Collection;

pub const DEFAULT_THRESHOLD: f32 = 0.25;
pub const DEFAULT_OVERSAMPLE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retriever {
    threshold: f32,
    oversample: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self { threshold: DEFAULT_THRESHOLD, oversample: DEFAULT_OVERSAMPLE }
    }
}

impl Retriever {
    pub fn new(threshold: f32, oversample: usize) -> Self {
        Self { threshold, oversample: oversample.max(1) }
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self::new(settings.threshold, settings.oversample)
    }

    pub fn threshold(&self) -> f32 { self.threshold }

    /// Look up `index_name` and search it. `threshold` overrides the default.
    pub fn search(
        &self,
        catalog: &IndexCatalog,
        query: &UnitVector,
        k: usize,
        index_name: &str,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let collection = catalog.get(index_name)?;
        self.search_collection(&collection, query, k, threshold)
    }

    /// At most `k` results scoring strictly above the threshold, best first.
    /// Never padded: fewer survivors means a shorter list.
    pub fn search_collection(
        &self,
        collection: &Collection,
        query: &UnitVector,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if query.dim() != collection.dim() {
            return Err(Error::load(
                collection.name(),
                format!("query dimension {} does not match index dimension {}", query.dim(), collection.dim()),
            ));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let threshold = threshold.unwrap_or(self.threshold);
        let pool = k.saturating_mul(self.oversample).min(collection.size());
        let candidates = collection.index().top_candidates(query, pool);
        let fetched = candidates.len();

        let results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|c| c.score > threshold)
            .filter_map(|c| {
                collection.record(c.id).map(|record| SearchResult {
                    score: c.score,
                    id: c.id,
                    record: record.clone(),
                    origin: collection.name().to_string(),
                })
            })
            .take(k)
            .collect();
        debug!(collection = collection.name(), k, pool, fetched, kept = results.len(), threshold, "index searched");
        Ok(results)
    }
}
