use crate::types::UnitVector;

/// External text-embedding function. Output need not be normalized; the
/// engine normalizes before caching or comparing.
pub trait Encoder: Send + Sync {
    /// Stable identifier for the model (e.g. `local:xlm-roberta:d1024`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// A similarity candidate. `score` is already on the unified cosine scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: u64,
    pub score: f32,
}

/// Read-only nearest-neighbour structure over unit vectors.
pub trait VectorIndex: Send + Sync {
    fn size(&self) -> usize;
    fn dim(&self) -> usize;
    fn vector_at(&self, id: u64) -> Option<&UnitVector>;
    /// Up to `count` candidates, similarity descending, equal scores by id ascending.
    fn top_candidates(&self, query: &UnitVector, count: usize) -> Vec<Candidate>;
}
