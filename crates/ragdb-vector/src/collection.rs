//! A named index paired with its metadata store.
//!
//! Pairing contract: every vector id `i` in the index resolves to record `i`
//! in the metadata, and the two hold the same number of entries. Both
//! [`Collection::load`] and [`Collection::from_parts`] refuse anything else.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use ragdb_core::corpus::Corpus;
use ragdb_core::traits::{Encoder, VectorIndex};
use ragdb_core::types::{l2_norm, Record, UnitVector, NORM_TOLERANCE};
use ragdb_core::{Error, Result};

use crate::artifact::{self, RawIndex};
use crate::index::FlatIndex;
use crate::metadata::MetadataStore;
use crate::metric::Metric;

const BUILD_BATCH: usize = 64;

#[derive(Debug)]
pub struct Collection {
    name: String,
    index: FlatIndex,
    metadata: MetadataStore,
}

impl Collection {
    pub fn from_parts(name: impl Into<String>, index: FlatIndex, metadata: MetadataStore) -> Result<Self> {
        let name = name.into();
        check_pairing(&name, &index, &metadata)?;
        Ok(Self { name, index, metadata })
    }

    /// Load a binary index artifact and its JSON metadata.
    ///
    /// Stored vectors are renormalized; a stored norm that strays beyond
    /// [`NORM_TOLERANCE`] is logged since it means the writer skipped
    /// normalization.
    pub fn load(name: &str, index_path: &Path, metadata_path: &Path) -> Result<Self> {
        debug!(collection = name, index = %index_path.display(), metadata = %metadata_path.display(), "loading collection");
        let raw = artifact::read_index(index_path)
            .map_err(|e| Error::load(name, format!("{}: {e}", index_path.display())))?;
        let metadata = MetadataStore::load(metadata_path)
            .map_err(|e| Error::load(name, format!("{}: {e}", metadata_path.display())))?;
        let index = normalize_raw(name, raw)?;
        let collection = Self::from_parts(name, index, metadata)?;
        info!(collection = name, size = collection.size(), dim = collection.dim(), metric = ?collection.metric(), "collection loaded");
        Ok(collection)
    }

    /// Embed a corpus in id order. Record `i` and vector `i` come from the
    /// same corpus entry, so the result is paired by construction.
    pub fn build(name: &str, corpus: &Corpus, encoder: &dyn Encoder, metric: Metric) -> Result<Self> {
        let dim = encoder.dim();
        let texts = corpus.texts();
        info!(collection = name, records = texts.len(), encoder = encoder.id(), "building collection");
        let pb = ProgressBar::new(texts.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BUILD_BATCH) {
            let raw = encoder
                .encode_batch(batch)
                .map_err(|e| Error::EmbeddingFailure(e.to_string()))?;
            if raw.len() != batch.len() {
                return Err(Error::EmbeddingFailure(format!(
                    "encoder returned {} vectors for {} texts",
                    raw.len(),
                    batch.len()
                )));
            }
            for v in raw {
                let id = vectors.len();
                if v.len() != dim {
                    return Err(Error::EmbeddingFailure(format!("record {id}: {} dims, expected {dim}", v.len())));
                }
                let unit = UnitVector::normalize(v)
                    .map_err(|e| Error::EmbeddingFailure(format!("record {id}: {e}")))?;
                vectors.push(unit);
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("done");

        let index = FlatIndex::from_vectors(metric, dim, vectors).map_err(|e| Error::load(name, e.to_string()))?;
        let records: Vec<Record> = corpus.iter().map(|(_, r)| r.clone()).collect();
        Self::from_parts(name, index, MetadataStore::new(records))
    }

    /// Persist both artifacts.
    pub fn write(&self, index_path: &Path, metadata_path: &Path) -> Result<()> {
        let entries: Vec<(u64, &[f32])> = self.index.entries().map(|(id, v)| (id, v.as_slice())).collect();
        artifact::write_index(index_path, self.index.metric(), self.index.dim(), entries.into_iter())
            .map_err(|e| Error::load(&self.name, format!("writing {}: {e}", index_path.display())))?;
        self.metadata
            .write(metadata_path)
            .map_err(|e| Error::load(&self.name, format!("writing {}: {e}", metadata_path.display())))?;
        info!(collection = %self.name, index = %index_path.display(), metadata = %metadata_path.display(), "collection written");
        Ok(())
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn index(&self) -> &FlatIndex { &self.index }

    pub fn metadata(&self) -> &MetadataStore { &self.metadata }

    pub fn size(&self) -> usize { self.index.size() }

    pub fn dim(&self) -> usize { self.index.dim() }

    pub fn metric(&self) -> Metric { self.index.metric() }

    pub fn record(&self, id: u64) -> Option<&Arc<Record>> { self.metadata.get(id) }

    /// Every collection in a process must share the encoder's dimension.
    pub fn check_dim(&self, expected: usize) -> Result<()> {
        if self.dim() != expected {
            return Err(Error::load(
                &self.name,
                format!("index dimension {} does not match encoder dimension {expected}", self.dim()),
            ));
        }
        Ok(())
    }
}

fn normalize_raw(name: &str, raw: RawIndex) -> Result<FlatIndex> {
    let RawIndex { metric, dim, entries } = raw;
    let mut drifted = 0usize;
    let mut units = Vec::with_capacity(entries.len());
    for (id, v) in entries {
        if (l2_norm(&v) - 1.0).abs() > NORM_TOLERANCE {
            drifted += 1;
        }
        let unit = UnitVector::normalize(v).map_err(|e| Error::load(name, format!("vector {id}: {e}")))?;
        units.push((id, unit));
    }
    if drifted > 0 {
        warn!(collection = name, drifted, "stored vectors were not unit length; renormalized");
    }
    FlatIndex::new(metric, dim, units).map_err(|e| Error::load(name, e.to_string()))
}

fn check_pairing(name: &str, index: &FlatIndex, metadata: &MetadataStore) -> Result<()> {
    let (n, m) = (index.size(), metadata.len());
    if n != m {
        return Err(Error::load(name, format!("index holds {n} vectors but metadata holds {m} records")));
    }
    if let Some(&bad) = index.ids().iter().find(|&&id| id >= m as u64) {
        return Err(Error::load(name, format!("vector id {bad} has no metadata record (records: {m})")));
    }
    Ok(())
}
