//! Domain types shared by the index, cache, curator and fan-out engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Largest deviation from unit norm still accepted as "already normalized".
pub const NORM_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VectorError {
    #[error("vector is empty")]
    Empty,
    #[error("vector contains NaN or infinite components")]
    NonFinite,
    #[error("vector has zero norm")]
    ZeroNorm,
}

/// An L2-normalized embedding.
///
/// The only way to obtain one is [`UnitVector::normalize`], so every vector
/// held by an index or the embedding cache has unit norm and the inner
/// product of two of them is their cosine similarity. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitVector(Arc<[f32]>);

impl UnitVector {
    pub fn normalize(mut raw: Vec<f32>) -> Result<Self, VectorError> {
        if raw.is_empty() {
            return Err(VectorError::Empty);
        }
        if raw.iter().any(|x| !x.is_finite()) {
            return Err(VectorError::NonFinite);
        }
        let norm = l2_norm(&raw);
        if norm <= f32::EPSILON {
            return Err(VectorError::ZeroNorm);
        }
        for x in &mut raw {
            *x /= norm;
        }
        Ok(Self(raw.into()))
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Inner product; equals cosine similarity for two unit vectors.
    pub fn dot(&self, other: &UnitVector) -> f32 {
        dot(&self.0, &other.0)
    }

    /// Squared euclidean distance; `2 - 2 * dot` for unit vectors.
    pub fn squared_l2(&self, other: &UnitVector) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// A metadata record: the passage a vector was computed from plus provenance.
///
/// `fields` keeps every provenance key that is neither the text nor the
/// source identifier (`article_ref`, `source_file`, `topic`, `pdf_page`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    pub source: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Record {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { text: text.into(), source: source.into(), fields: BTreeMap::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// String-valued provenance field, ignoring blank values.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One ranked hit. Higher `score` is always more similar (cosine scale).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub score: f32,
    pub id: u64,
    pub record: Arc<Record>,
    pub origin: String,
}

/// Parameters of one retrieval call; lives for a single invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query: String,
    pub indexes: Vec<String>,
    pub k_per_index: usize,
    /// `None` uses the configured default threshold.
    pub threshold: Option<f32>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), indexes: Vec::new(), k_per_index: 5, threshold: None }
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(name.into());
        self
    }

    pub fn k(mut self, k: usize) -> Self {
        self.k_per_index = k;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}
