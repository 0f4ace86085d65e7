//! Turn-scoped embedding cache keyed by content hash.
//!
//! One instance per conversation. The orchestration layer calls
//! [`EmbeddingCache::clear_turn`] at the start of every turn; within a turn,
//! identical text is embedded once and concurrent callers for the same text
//! wait on the first computation instead of repeating it.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use ragdb_core::traits::Encoder;
use ragdb_core::types::UnitVector;
use ragdb_core::{Error, Result};

/// blake3 of the exact text, hex encoded.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub turn: u64,
}

/// Failure of an in-flight computation, shared by every caller waiting on it.
#[derive(Debug, Clone)]
enum Fault {
    Timeout(u64),
    Failure(String),
}

impl Fault {
    fn into_error(self) -> Error {
        match self {
            Fault::Timeout(ms) => Error::EmbeddingTimeout(ms),
            Fault::Failure(reason) => Error::EmbeddingFailure(reason),
        }
    }
}

type Pending = Shared<BoxFuture<'static, std::result::Result<UnitVector, Fault>>>;

#[derive(Clone)]
enum Slot {
    Ready(UnitVector),
    Pending(Pending),
}

pub struct EmbeddingCache {
    encoder: Arc<dyn Encoder>,
    timeout: Option<Duration>,
    entries: Mutex<HashMap<String, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    turn: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            timeout: None,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            turn: AtomicU64::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> { &self.encoder }

    pub fn dim(&self) -> usize { self.encoder.dim() }

    /// Normalized embedding of `text`, computed at most once per turn.
    ///
    /// Concurrent callers for the same text await one shared computation.
    /// The timeout runs from the moment that computation starts, so every
    /// waiter is released no later than one timeout after the first caller,
    /// and a failed computation is never re-run by the callers waiting on it.
    pub async fn embed(&self, text: &str) -> Result<UnitVector> {
        let key = content_hash(text);
        let pending = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            match entries.get(&key) {
                Some(Slot::Ready(v)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(v.clone());
                }
                Some(Slot::Pending(p)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    p.clone()
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    let p = self.start(text.to_string());
                    entries.insert(key.clone(), Slot::Pending(p.clone()));
                    p
                }
            }
        };

        let outcome = pending.clone().await;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // The turn may have been cleared while this was in flight.
        let current = matches!(entries.get(&key), Some(Slot::Pending(p)) if p.ptr_eq(&pending));
        match outcome {
            Ok(vector) => {
                if current {
                    entries.insert(key, Slot::Ready(vector.clone()));
                }
                Ok(vector)
            }
            Err(fault) => {
                if current {
                    entries.remove(&key);
                }
                Err(fault.into_error())
            }
        }
    }

    fn start(&self, text: String) -> Pending {
        let encoder = Arc::clone(&self.encoder);
        let timeout = self.timeout;
        let task = tokio::spawn(compute(encoder, text, timeout));
        async move {
            task.await
                .unwrap_or_else(|e| Err(Fault::Failure(format!("embedding task failed: {e}"))))
        }
        .boxed()
        .shared()
    }

    /// Drop every cached vector. Call once at the start of each turn.
    pub fn clear_turn(&self) {
        let dropped = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let n = entries.len();
            entries.clear();
            n
        };
        let turn = self.turn.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(turn, dropped, "embedding cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            turn: self.turn.load(Ordering::Relaxed),
        }
    }
}

async fn compute(encoder: Arc<dyn Encoder>, text: String, timeout: Option<Duration>) -> std::result::Result<UnitVector, Fault> {
    let expected = encoder.dim();
    let task = tokio::task::spawn_blocking(move || encoder.encode(&text));
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| Fault::Timeout(limit.as_millis() as u64))?,
        None => task.await,
    };
    let raw = joined
        .map_err(|e| Fault::Failure(format!("encoder task failed: {e}")))?
        .map_err(|e| Fault::Failure(e.to_string()))?;
    if raw.len() != expected {
        return Err(Fault::Failure(format!("encoder returned {} dims, expected {expected}", raw.len())));
    }
    UnitVector::normalize(raw).map_err(|e| Fault::Failure(e.to_string()))
}
