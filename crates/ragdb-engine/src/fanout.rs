//! Scatter one query over several named indexes and gather a single ranking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use ragdb_core::types::{RetrievalRequest, SearchResult, UnitVector};
use ragdb_core::{Error, Result};
use ragdb_vector::{EmbeddingCache, IndexCatalog, Retriever};

/// An index whose contribution was dropped from a combined search.
#[derive(Debug)]
pub struct IndexWarning {
    pub index: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct CombinedResults {
    pub results: Vec<SearchResult>,
    pub warnings: Vec<IndexWarning>,
}

impl CombinedResults {
    pub fn is_empty(&self) -> bool { self.results.is_empty() }
}

/// Concatenate per-index lists in request order and sort by score,
/// descending. The sort is stable, so equal scores keep request order and
/// then per-index rank.
pub fn merge(batches: Vec<Vec<SearchResult>>) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = batches.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged
}

#[derive(Debug, Clone)]
pub struct FanOut {
    catalog: Arc<IndexCatalog>,
    retriever: Retriever,
}

impl FanOut {
    pub fn new(catalog: Arc<IndexCatalog>, retriever: Retriever) -> Self {
        Self { catalog, retriever }
    }

    pub fn catalog(&self) -> &Arc<IndexCatalog> { &self.catalog }

    pub fn retriever(&self) -> &Retriever { &self.retriever }

    pub async fn search_combined<S: AsRef<str>>(
        &self,
        cache: &EmbeddingCache,
        query: &str,
        index_names: &[S],
        k_per_index: usize,
    ) -> Result<CombinedResults> {
        self.search_with_threshold(cache, query, index_names, k_per_index, None).await
    }

    pub async fn search_request(&self, cache: &EmbeddingCache, request: &RetrievalRequest) -> Result<CombinedResults> {
        self.search_with_threshold(cache, &request.query, request.indexes.as_slice(), request.k_per_index, request.threshold)
            .await
    }

    /// Embed `query` once, search every distinct named index concurrently,
    /// and merge. Unknown indexes become warnings; an embedding failure or a
    /// fatal index error fails the whole call.
    pub async fn search_with_threshold<S: AsRef<str>>(
        &self,
        cache: &EmbeddingCache,
        query: &str,
        index_names: &[S],
        k_per_index: usize,
        threshold: Option<f32>,
    ) -> Result<CombinedResults> {
        if query.trim().is_empty() {
            debug!("blank query, nothing to search");
            return Ok(CombinedResults::default());
        }
        let mut seen = HashSet::new();
        let names: Vec<String> = index_names
            .iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| seen.insert(n.clone()))
            .collect();
        if names.is_empty() || k_per_index == 0 {
            return Ok(CombinedResults::default());
        }

        let vector = cache.embed(query).await?;
        let outcomes = self.search_all(&names, &vector, k_per_index, threshold).await;

        let mut batches = Vec::with_capacity(names.len());
        let mut warnings = Vec::new();
        for (name, outcome) in names.into_iter().zip(outcomes) {
            match outcome {
                Ok(results) => batches.push(results),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(index = %name, %error, "index dropped from combined search");
                    warnings.push(IndexWarning { index: name, error });
                }
            }
        }
        let results = merge(batches);
        debug!(results = results.len(), warnings = warnings.len(), "combined search finished");
        Ok(CombinedResults { results, warnings })
    }

    /// One blocking search per name, all in a single task set sized to the
    /// request. Outcomes come back in `names` order regardless of which
    /// search finishes first.
    async fn search_all(&self, names: &[String], vector: &UnitVector, k: usize, threshold: Option<f32>) -> Vec<Result<Vec<SearchResult>>> {
        let mut tasks = JoinSet::new();
        let mut positions = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            let catalog = Arc::clone(&self.catalog);
            let retriever = self.retriever;
            let vector = vector.clone();
            let index = name.clone();
            let handle = tasks.spawn_blocking(move || retriever.search(&catalog, &vector, k, &index, threshold));
            positions.insert(handle.id(), position);
        }

        let mut outcomes: Vec<Option<Result<Vec<SearchResult>>>> = names.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => {
                    let index = positions.get(&e.id()).map(|&p| names[p].clone()).unwrap_or_default();
                    (e.id(), Err(Error::SearchFailed { index, reason: e.to_string() }))
                }
            };
            if let Some(&position) = positions.get(&id) {
                outcomes[position] = Some(outcome);
            }
        }
        names
            .iter()
            .zip(outcomes)
            .map(|(name, outcome)| {
                outcome.unwrap_or_else(|| Err(Error::SearchFailed { index: name.clone(), reason: "search task did not report".to_string() }))
            })
            .collect()
    }
}
