//! Named collections loaded once at startup and shared read-only.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::traits::Encoder;
use ragdb_core::{Error, Result};

use crate::collection::Collection;
use crate::integrity;

#[derive(Debug, Default, Clone)]
pub struct IndexCatalog {
    collections: HashMap<String, Arc<Collection>>,
    order: Vec<String>,
}

impl IndexCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, collection: Collection) -> Result<()> {
        let name = collection.name().to_string();
        if self.collections.contains_key(&name) {
            return Err(Error::InvalidConfig(format!("duplicate collection '{name}'")));
        }
        if let Some(first) = self.order.first().and_then(|n| self.collections.get(n)) {
            if first.dim() != collection.dim() {
                return Err(Error::load(
                    &name,
                    format!("dimension {} differs from '{}' ({})", collection.dim(), first.name(), first.dim()),
                ));
            }
        }
        self.order.push(name.clone());
        self.collections.insert(name, Arc::new(collection));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    /// Names in insertion order.
    pub fn names(&self) -> &[String] { &self.order }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Load every configured collection. Paths resolve against `base`.
    ///
    /// With an encoder, each collection's dimension must match it and the
    /// content spot-check runs under the configured integrity mode. Any
    /// failure aborts startup.
    pub fn load(settings: &RetrievalSettings, base: &Path, encoder: Option<&dyn Encoder>) -> Result<Self> {
        let mut catalog = Self::new();
        for (name, index_path, metadata_path) in settings.collection_paths(base) {
            let collection = Collection::load(&name, &index_path, &metadata_path)?;
            if let Some(encoder) = encoder {
                collection.check_dim(encoder.dim())?;
                integrity::verify(
                    &collection,
                    encoder,
                    settings.integrity,
                    settings.spot_check_samples,
                    settings.spot_check_min_similarity,
                )?;
            }
            catalog.insert(collection)?;
        }
        info!(collections = catalog.len(), "index catalog ready");
        Ok(catalog)
    }
}
