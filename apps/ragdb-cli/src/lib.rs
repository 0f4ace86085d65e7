//! Shared plumbing for the `ragdb` binaries: argument parsing, config and
//! encoder setup, and the build / query / check commands.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragdb_core::config::{resolve_with_base, Config, RetrievalSettings};
use ragdb_core::corpus::CorpusBuilder;
use ragdb_core::traits::Encoder;
use ragdb_engine::Engine;
use ragdb_vector::{integrity, Collection, IndexCatalog, Metric};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// `[retrieval]` settings plus the directory relative paths resolve against.
pub fn load_settings() -> Result<(RetrievalSettings, PathBuf)> {
    let config = Config::load().context("loading configuration")?;
    let settings = config.retrieval()?;
    let base = std::env::current_dir()?;
    Ok((settings, base))
}

pub fn default_encoder() -> Result<Arc<dyn Encoder>> {
    Ok(Arc::from(ragdb_embed::get_default_encoder()?))
}

pub fn parse_metric(s: &str) -> Result<Metric> {
    match s {
        "ip" | "inner_product" => Ok(Metric::InnerProduct),
        "l2" | "normalized_distance" => Ok(Metric::NormalizedDistance),
        other => Err(anyhow!("unknown metric '{other}' (expected ip or l2)")),
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1).map(String::as_str).ok_or_else(|| anyhow!("{flag} requires a value"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildArgs {
    pub data_dir: PathBuf,
    pub name: String,
    pub limit: Option<usize>,
    pub metric: Metric,
    pub out_dir: Option<PathBuf>,
}

/// `<data_dir> --name N [--limit N] [--metric ip|l2] [--out DIR]`
pub fn parse_build_args(args: &[String]) -> Result<BuildArgs> {
    let mut data_dir = None;
    let mut name = None;
    let mut limit = None;
    let mut metric = Metric::InnerProduct;
    let mut out_dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--name" | "-n" => { name = Some(value(args, i, "--name")?.to_string()); i += 1; }
            "--limit" => {
                let raw = value(args, i, "--limit")?;
                limit = Some(raw.parse::<usize>().map_err(|_| anyhow!("--limit requires a number, got '{raw}'"))?);
                i += 1;
            }
            "--metric" => { metric = parse_metric(value(args, i, "--metric")?)?; i += 1; }
            "--out" => { out_dir = Some(PathBuf::from(value(args, i, "--out")?)); i += 1; }
            a if !a.starts_with('-') => data_dir = Some(PathBuf::from(a)),
            other => bail!("unknown flag {other}"),
        }
        i += 1;
    }
    let data_dir = data_dir.ok_or_else(|| anyhow!("missing <data_dir>"))?;
    let name = name.ok_or_else(|| anyhow!("missing --name"))?;
    Ok(BuildArgs { data_dir, name, limit, metric, out_dir })
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryArgs {
    pub query: String,
    pub indexes: Vec<String>,
    pub k: Option<usize>,
    pub risk: f32,
    pub threshold: Option<f32>,
}

/// `<query> [--index NAME]... [--k N] [--risk X] [--threshold X]`
pub fn parse_query_args(args: &[String]) -> Result<QueryArgs> {
    let mut query = None;
    let mut parsed = QueryArgs { query: String::new(), indexes: Vec::new(), k: None, risk: 0.0, threshold: None };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index" | "-i" => { parsed.indexes.push(value(args, i, "--index")?.to_string()); i += 1; }
            "--k" | "-k" => { parsed.k = Some(value(args, i, "--k")?.parse().context("--k requires a number")?); i += 1; }
            "--risk" => { parsed.risk = value(args, i, "--risk")?.parse().context("--risk requires a number")?; i += 1; }
            "--threshold" => { parsed.threshold = Some(value(args, i, "--threshold")?.parse().context("--threshold requires a number")?); i += 1; }
            a if !a.starts_with('-') && query.is_none() => query = Some(a.to_string()),
            other => bail!("unexpected argument {other}"),
        }
        i += 1;
    }
    parsed.query = query.ok_or_else(|| anyhow!("missing <query>"))?;
    Ok(parsed)
}

/// Where a collection's artifacts live: the configured paths when the name is
/// configured, otherwise `<dir>/<name>.rvx` and `<dir>/<name>.json`.
pub fn artifact_paths(settings: &RetrievalSettings, base: &Path, name: &str, out_dir: Option<&Path>) -> (PathBuf, PathBuf) {
    if out_dir.is_none() {
        if let Some((_, index, metadata)) = settings.collection_paths(base).into_iter().find(|(n, _, _)| n == name) {
            return (index, metadata);
        }
    }
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => resolve_with_base(base, &settings.index_dir),
    };
    (dir.join(format!("{name}.rvx")), dir.join(format!("{name}.json")))
}

/// Chunk a text directory, embed it in id order and write both artifacts.
pub fn run_build(settings: &RetrievalSettings, base: &Path, encoder: &dyn Encoder, args: &BuildArgs) -> Result<Collection> {
    let builder = CorpusBuilder::new();
    let corpus = match args.limit {
        Some(limit) => builder.from_directory_limited(&args.data_dir, limit)?,
        None => builder.from_directory(&args.data_dir)?,
    };
    if corpus.is_empty() {
        bail!("no .txt content found under {}", args.data_dir.display());
    }
    let collection = Collection::build(&args.name, &corpus, encoder, args.metric)?;
    let (index_path, metadata_path) = artifact_paths(settings, base, &args.name, args.out_dir.as_deref());
    collection.write(&index_path, &metadata_path)?;
    println!("✅ Built '{}': {} records, dim {}", args.name, collection.size(), collection.dim());
    println!("   index:    {}", index_path.display());
    println!("   metadata: {}", metadata_path.display());
    Ok(collection)
}

pub async fn run_query(settings: &RetrievalSettings, base: &Path, encoder: Arc<dyn Encoder>, args: &QueryArgs) -> Result<String> {
    if settings.collections.is_empty() {
        bail!("no [[retrieval.collections]] configured");
    }
    let engine = Arc::new(Engine::from_settings(settings, base, encoder)?);
    let session = engine.session();
    session.begin_turn();

    let indexes = if args.indexes.is_empty() { engine.index_names().to_vec() } else { args.indexes.clone() };
    let k = args.k.unwrap_or_else(|| session.dynamic_k(&args.query, args.risk));
    info!(k, indexes = ?indexes, "querying");

    let mut request = ragdb_core::RetrievalRequest::new(&args.query).k(k);
    request.indexes = indexes;
    request.threshold = args.threshold;
    let combined = session.search(&request).await?;
    for warning in &combined.warnings {
        eprintln!("⚠️  {}: {}", warning.index, warning.error);
    }
    println!("🔍 {} results for \"{}\" (k={k} per index)", combined.results.len(), args.query);
    for (i, r) in combined.results.iter().enumerate() {
        println!("  {}. score={:.4}  index={}  id={}  tag={}", i + 1, r.score, r.origin, r.id, session.tag_for(&r.record));
    }
    let context = ragdb_curate::render_context(&engine.curator().curate(&combined.results));
    println!("\n{context}");
    Ok(context)
}

/// Load every configured collection and spot-check it. Returns whether all
/// collections passed.
pub fn run_check(settings: &RetrievalSettings, base: &Path, encoder: &dyn Encoder) -> Result<bool> {
    let catalog = IndexCatalog::load(settings, base, None)?;
    let mut all_passed = true;
    for name in catalog.names() {
        let collection = catalog.get(name)?;
        collection.check_dim(encoder.dim())?;
        let report = integrity::spot_check(
            &collection,
            encoder,
            settings.spot_check_samples,
            settings.spot_check_min_similarity,
        )?;
        if report.passed() {
            println!("✅ {name}: {} records, {} sampled, aligned", collection.size(), report.checked);
        } else {
            all_passed = false;
            println!(
                "❌ {name}: {} of {} sampled records misaligned, {} could not be re-embedded",
                report.mismatches.len(),
                report.checked,
                report.unchecked
            );
            for m in &report.mismatches {
                println!("     record {} nearest vector {} (similarity {:.3})", m.id, m.nearest, m.similarity);
            }
        }
    }
    Ok(all_passed)
}
