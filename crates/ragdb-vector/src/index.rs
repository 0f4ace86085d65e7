//! Exact in-memory nearest-neighbour index.

use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

use ragdb_core::traits::{Candidate, VectorIndex};
use ragdb_core::types::UnitVector;

use crate::metric::Metric;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("vector {id} has dimension {actual}, index dimension is {expected}")]
    DimMismatch { id: u64, expected: usize, actual: usize },
    #[error("id {0} appears more than once")]
    DuplicateId(u64),
    #[error("index dimension must be positive")]
    ZeroDim,
}

/// Brute-force index over unit vectors with explicit ids.
///
/// Immutable after construction, so it is shared across threads behind an
/// `Arc` without locking.
#[derive(Debug)]
pub struct FlatIndex {
    metric: Metric,
    dim: usize,
    ids: Vec<u64>,
    vectors: Vec<UnitVector>,
    positions: HashMap<u64, usize>,
}

impl FlatIndex {
    pub fn new(metric: Metric, dim: usize, entries: Vec<(u64, UnitVector)>) -> Result<Self, IndexError> {
        if dim == 0 {
            return Err(IndexError::ZeroDim);
        }
        let mut ids = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());
        let mut positions = HashMap::with_capacity(entries.len());
        for (id, vector) in entries {
            if vector.dim() != dim {
                return Err(IndexError::DimMismatch { id, expected: dim, actual: vector.dim() });
            }
            if positions.insert(id, ids.len()).is_some() {
                return Err(IndexError::DuplicateId(id));
            }
            ids.push(id);
            vectors.push(vector);
        }
        Ok(Self { metric, dim, ids, vectors, positions })
    }

    /// Dense ids `0..n` in the given order.
    pub fn from_vectors(metric: Metric, dim: usize, vectors: Vec<UnitVector>) -> Result<Self, IndexError> {
        let entries = vectors.into_iter().enumerate().map(|(i, v)| (i as u64, v)).collect();
        Self::new(metric, dim, entries)
    }

    pub fn metric(&self) -> Metric { self.metric }

    pub fn ids(&self) -> &[u64] { &self.ids }

    pub fn entries(&self) -> impl Iterator<Item = (u64, &UnitVector)> {
        self.ids.iter().copied().zip(self.vectors.iter())
    }
}

fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

impl VectorIndex for FlatIndex {
    fn size(&self) -> usize { self.ids.len() }

    fn dim(&self) -> usize { self.dim }

    fn vector_at(&self, id: u64) -> Option<&UnitVector> {
        self.positions.get(&id).map(|&pos| &self.vectors[pos])
    }

    fn top_candidates(&self, query: &UnitVector, count: usize) -> Vec<Candidate> {
        if count == 0 || self.ids.is_empty() || query.dim() != self.dim {
            return Vec::new();
        }
        let mut scored: Vec<Candidate> = self
            .entries()
            .map(|(id, v)| Candidate { id, score: self.metric.similarity(query, v) })
            .filter(|c| c.score.is_finite())
            .collect();
        if count < scored.len() {
            scored.select_nth_unstable_by(count - 1, rank_order);
            scored.truncate(count);
        }
        scored.sort_by(rank_order);
        scored
    }
}
