//! Load-time self-check for id alignment between vectors and records.
//!
//! Re-embeds the text of a few sampled records and asks the index where that
//! text lands. If record `i` is paired correctly, its fresh embedding is
//! closest to stored vector `i` (or at least very similar to it). Sampling is
//! evenly strided so the check is reproducible.

use tracing::{debug, warn};

use ragdb_core::config::IntegrityMode;
use ragdb_core::traits::{Encoder, VectorIndex};
use ragdb_core::types::UnitVector;
use ragdb_core::{Error, Result};

use crate::collection::Collection;

/// Slack when comparing the paired vector against the nearest neighbour, so
/// exact duplicates in the corpus do not count as misalignment.
const NEAREST_SLACK: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub id: u64,
    /// Nearest stored vector to the re-embedded record text.
    pub nearest: u64,
    /// Similarity between the re-embedded text and stored vector `id`.
    pub similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    pub checked: usize,
    /// Sampled records the encoder could not re-embed.
    pub unchecked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool { self.mismatches.is_empty() && self.unchecked == 0 }

    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(first) = self.mismatches.first() {
            parts.push(format!(
                "{} of {} sampled records look misaligned (record {} is nearest to vector {}, similarity {:.3})",
                self.mismatches.len(),
                self.checked,
                first.id,
                first.nearest,
                first.similarity
            ));
        }
        if self.unchecked > 0 {
            parts.push(format!("{} sampled records could not be re-embedded", self.unchecked));
        }
        parts.join("; ")
    }
}

pub fn sample_ids(size: usize, samples: usize) -> Vec<u64> {
    if size == 0 || samples == 0 {
        return Vec::new();
    }
    let samples = samples.min(size);
    let stride = size / samples;
    (0..samples).map(|i| (i * stride) as u64).collect()
}

pub fn spot_check(collection: &Collection, encoder: &dyn Encoder, samples: usize, min_similarity: f32) -> Result<IntegrityReport> {
    let index = collection.index();
    let mut report = IntegrityReport::default();
    for id in sample_ids(collection.size(), samples) {
        let (Some(record), Some(stored)) = (collection.record(id), index.vector_at(id)) else {
            continue;
        };
        let encoded = encoder
            .encode(&record.text)
            .map_err(|e| e.to_string())
            .and_then(|raw| UnitVector::normalize(raw).map_err(|e| e.to_string()));
        let fresh = match encoded {
            Ok(fresh) => fresh,
            Err(reason) => {
                warn!(collection = collection.name(), id, %reason, "could not re-embed sampled record");
                report.unchecked += 1;
                continue;
            }
        };
        if fresh.dim() != index.dim() {
            return Err(Error::load(
                collection.name(),
                format!("encoder dimension {} does not match index dimension {}", fresh.dim(), index.dim()),
            ));
        }
        let similarity = collection.metric().similarity(&fresh, stored);
        let nearest = index.top_candidates(&fresh, 1).first().copied();
        report.checked += 1;
        let displaced = nearest.is_some_and(|c| c.id != id && c.score > similarity + NEAREST_SLACK);
        if similarity < min_similarity || displaced {
            report.mismatches.push(Mismatch { id, nearest: nearest.map_or(id, |c| c.id), similarity });
        }
    }
    debug!(
        collection = collection.name(),
        checked = report.checked,
        unchecked = report.unchecked,
        mismatches = report.mismatches.len(),
        "spot check finished"
    );
    Ok(report)
}

/// Run the spot-check under `mode`. Advisory mode only logs; enforce turns
/// mismatches, or samples that could not be checked, into a load failure.
pub fn verify(collection: &Collection, encoder: &dyn Encoder, mode: IntegrityMode, samples: usize, min_similarity: f32) -> Result<Option<IntegrityReport>> {
    if mode == IntegrityMode::Off {
        return Ok(None);
    }
    let report = spot_check(collection, encoder, samples, min_similarity)?;
    if !report.passed() {
        let summary = report.summary();
        match mode {
            IntegrityMode::Enforce => return Err(Error::load(collection.name(), summary)),
            _ => warn!(collection = collection.name(), "{}", summary),
        }
    }
    Ok(Some(report))
}
