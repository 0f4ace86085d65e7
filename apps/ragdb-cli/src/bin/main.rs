use std::env;

use ragdb_cli::{
    default_encoder, init_tracing, load_settings, parse_build_args, parse_query_args, run_build, run_check, run_query,
};

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <build|query|check> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let (cmd, args) = parse_args();
    let (settings, base) = load_settings().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    match cmd.as_str() {
        "build" => {
            let build = parse_build_args(&args)?;
            let encoder = default_encoder()?;
            run_build(&settings, &base, encoder.as_ref(), &build)?;
        }
        "query" => {
            let query = parse_query_args(&args)?;
            run_query(&settings, &base, default_encoder()?, &query).await?;
        }
        "check" => {
            let encoder = default_encoder()?;
            if !run_check(&settings, &base, encoder.as_ref())? {
                std::process::exit(2);
            }
        }
        _ => { eprintln!("Unknown command: {}", cmd); std::process::exit(1); }
    }
    Ok(())
}
