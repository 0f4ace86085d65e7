use std::env;

use ragdb_cli::{default_encoder, init_tracing, load_settings, parse_build_args, run_build};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: ragdb-indexer <data_dir> --name <collection> [--limit N] [--metric ip|l2] [--out DIR]");
        std::process::exit(1);
    }
    let (settings, base) = load_settings().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let build = parse_build_args(&args)?;
    println!("ragdb indexer\n=============");
    println!("Data directory: {}", build.data_dir.display());
    if let Some(limit) = build.limit { println!("🔢 Limiting to {} files", limit); }
    let encoder = default_encoder()?;
    run_build(&settings, &base, encoder.as_ref(), &build)?;
    println!("\n💡 Add it under [[retrieval.collections]] and query with: cargo run --bin ragdb-search '<query>' --index {}", build.name);
    Ok(())
}
