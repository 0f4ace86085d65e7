//! Index metric semantics and their mapping onto one similarity scale.

use ragdb_core::types::UnitVector;
use serde::{Deserialize, Serialize};

/// How an index reports closeness. Resolved once, from the artifact header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Raw score is the inner product; higher is closer.
    InnerProduct,
    /// Raw score is the squared euclidean distance; lower is closer.
    NormalizedDistance,
}

impl Metric {
    pub fn tag(self) -> u8 {
        match self {
            Self::InnerProduct => 0,
            Self::NormalizedDistance => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::InnerProduct),
            1 => Some(Self::NormalizedDistance),
            _ => None,
        }
    }

    /// The score the index natively reports for a pair.
    pub fn raw(self, a: &UnitVector, b: &UnitVector) -> f32 {
        match self {
            Self::InnerProduct => a.dot(b),
            Self::NormalizedDistance => a.squared_l2(b),
        }
    }

    /// Convert a native score to cosine similarity.
    ///
    /// For unit vectors `|a - b|^2 = 2 - 2cos`, so both variants land on the
    /// same `[-1, 1]` scale.
    pub fn to_similarity(self, raw: f32) -> f32 {
        let sim = match self {
            Self::InnerProduct => raw,
            Self::NormalizedDistance => 1.0 - raw / 2.0,
        };
        sim.clamp(-1.0, 1.0)
    }

    pub fn similarity(self, a: &UnitVector, b: &UnitVector) -> f32 {
        self.to_similarity(self.raw(a, b))
    }
}
