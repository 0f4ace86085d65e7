//! Process-wide engine and per-conversation sessions.
//!
//! Indexes are loaded once into an [`Engine`] and shared read-only. Each
//! conversation opens its own [`Session`], which owns the turn-scoped
//! embedding cache; sessions never share caches.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use ragdb_core::config::RetrievalSettings;
use ragdb_core::traits::Encoder;
use ragdb_core::types::{Record, RetrievalRequest, UnitVector};
use ragdb_core::Result;
use ragdb_curate::{dynamic_k, render_context, tag_for, ResultCurator, NO_CONTEXT};
use ragdb_vector::{CacheStats, EmbeddingCache, IndexCatalog, Retriever};

use crate::fanout::{CombinedResults, FanOut};

pub struct Engine {
    fanout: FanOut,
    curator: ResultCurator,
    encoder: Arc<dyn Encoder>,
    embed_timeout: Option<Duration>,
}

impl Engine {
    pub fn new(catalog: IndexCatalog, encoder: Arc<dyn Encoder>, retriever: Retriever, curator: ResultCurator) -> Self {
        Self { fanout: FanOut::new(Arc::new(catalog), retriever), curator, encoder, embed_timeout: None }
    }

    pub fn with_embed_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Load every configured collection against `encoder`, running the
    /// dimension and integrity checks, and wire the retrieval policy from the
    /// same settings.
    pub fn from_settings(settings: &RetrievalSettings, base: &Path, encoder: Arc<dyn Encoder>) -> Result<Self> {
        settings.validate()?;
        let catalog = IndexCatalog::load(settings, base, Some(encoder.as_ref()))?;
        info!(collections = ?catalog.names(), encoder = encoder.id(), "engine ready");
        Ok(Self::new(catalog, encoder, Retriever::from_settings(settings), ResultCurator::from_settings(settings))
            .with_embed_timeout(settings.embed_timeout()))
    }

    pub fn catalog(&self) -> &IndexCatalog { self.fanout.catalog() }

    pub fn curator(&self) -> &ResultCurator { &self.curator }

    pub fn index_names(&self) -> &[String] { self.catalog().names() }

    /// A fresh conversation with an empty cache.
    pub fn session(self: &Arc<Self>) -> Session {
        let cache = EmbeddingCache::new(Arc::clone(&self.encoder)).with_timeout(self.embed_timeout);
        Session { engine: Arc::clone(self), cache }
    }
}

pub struct Session {
    engine: Arc<Engine>,
    cache: EmbeddingCache,
}

impl Session {
    /// Start a new conversational turn. Must run before the turn's first
    /// embedding or search.
    pub fn begin_turn(&self) {
        self.cache.clear_turn();
    }

    pub fn cache(&self) -> &EmbeddingCache { &self.cache }

    pub fn cache_stats(&self) -> CacheStats { self.cache.stats() }

    pub async fn embed(&self, text: &str) -> Result<UnitVector> {
        self.cache.embed(text).await
    }

    pub async fn search_combined<S: AsRef<str>>(&self, query: &str, index_names: &[S], k_per_index: usize) -> Result<CombinedResults> {
        self.engine.fanout.search_combined(&self.cache, query, index_names, k_per_index).await
    }

    pub async fn search(&self, request: &RetrievalRequest) -> Result<CombinedResults> {
        self.engine.fanout.search_request(&self.cache, request).await
    }

    pub fn dynamic_k(&self, text: &str, risk_score: f32) -> usize {
        dynamic_k(text, risk_score)
    }

    pub fn tag_for(&self, record: &Record) -> String {
        tag_for(record, self.engine.curator.rules())
    }

    /// Curated, rendered context for a message. Retrieval failures degrade
    /// to the "no contextual knowledge" marker instead of failing the turn.
    pub async fn context_for<S: AsRef<str>>(&self, text: &str, risk_score: f32, index_names: &[S]) -> String {
        let k = dynamic_k(text, risk_score);
        match self.search_combined(text, index_names, k).await {
            Ok(combined) => render_context(&self.engine.curator.curate(&combined.results)),
            Err(error) => {
                warn!(%error, "retrieval failed; continuing without context");
                NO_CONTEXT.to_string()
            }
        }
    }
}
