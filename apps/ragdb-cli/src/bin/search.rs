use std::env;

use ragdb_cli::{default_encoder, init_tracing, load_settings, parse_query_args, run_query};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: ragdb-search <query> [--index NAME]... [--k N] [--risk X] [--threshold X]");
        eprintln!("Example: ragdb-search 'trouble sleeping' --index therapist --index personality --risk 0.4");
        std::process::exit(1);
    }
    let (settings, base) = load_settings().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let query = parse_query_args(&args)?;
    run_query(&settings, &base, default_encoder()?, &query).await?;
    Ok(())
}
