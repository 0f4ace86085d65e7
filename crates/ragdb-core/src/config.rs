//! Layered configuration and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_RETRIEVAL__THRESHOLD=0.3` overrides `retrieval.threshold`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Build from an in-memory TOML document (no files, no environment).
    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[retrieval]` section, defaulted when absent, validated.
    pub fn retrieval(&self) -> anyhow::Result<RetrievalSettings> {
        let settings: RetrievalSettings = if self.figment.contains("retrieval") {
            self.get("retrieval")?
        } else {
            RetrievalSettings::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if matches!(env, "prod" | "production") {
            // Production must know its collections; dev may start empty.
            let settings = self.retrieval()?;
            if settings.collections.is_empty() {
                anyhow::bail!("no [[retrieval.collections]] configured for production");
            }
        }
        Ok(())
    }
}

/// How strictly the content spot-check is applied when a collection loads.
/// Count and id-range checks always run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityMode {
    Off,
    #[default]
    Advisory,
    Enforce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub index: String,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRuleSpec {
    pub keyword: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub threshold: f32,
    pub oversample: usize,
    pub max_chars: usize,
    pub snippet_chars: usize,
    pub prefix_chars: usize,
    pub embed_timeout_ms: Option<u64>,
    pub integrity: IntegrityMode,
    pub spot_check_samples: usize,
    pub spot_check_min_similarity: f32,
    pub index_dir: String,
    pub collections: Vec<CollectionSpec>,
    pub tag_rules: Vec<TagRuleSpec>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            oversample: 3,
            max_chars: 2000,
            snippet_chars: 300,
            prefix_chars: 60,
            embed_timeout_ms: Some(10_000),
            integrity: IntegrityMode::Advisory,
            spot_check_samples: 8,
            spot_check_min_similarity: 0.5,
            index_dir: "indexes".to_string(),
            collections: Vec::new(),
            tag_rules: Vec::new(),
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(Error::InvalidConfig(format!("threshold {} outside [-1, 1]", self.threshold)));
        }
        if self.oversample == 0 {
            return Err(Error::InvalidConfig("oversample must be at least 1".into()));
        }
        if self.max_chars == 0 || self.snippet_chars == 0 || self.prefix_chars == 0 {
            return Err(Error::InvalidConfig("character budgets must be positive".into()));
        }
        let mut seen = HashSet::new();
        for c in &self.collections {
            if c.name.trim().is_empty() {
                return Err(Error::InvalidConfig("collection with empty name".into()));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate collection '{}'", c.name)));
            }
        }
        Ok(())
    }

    pub fn embed_timeout(&self) -> Option<Duration> {
        self.embed_timeout_ms.map(Duration::from_millis)
    }

    /// Resolve every collection's artifact paths against `index_dir`, which
    /// is itself resolved against `base`.
    pub fn collection_paths(&self, base: &Path) -> Vec<(String, PathBuf, PathBuf)> {
        let dir = resolve_with_base(base, &self.index_dir);
        self.collections
            .iter()
            .map(|c| (c.name.clone(), resolve_with_base(&dir, &c.index), resolve_with_base(&dir, &c.metadata)))
            .collect()
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
