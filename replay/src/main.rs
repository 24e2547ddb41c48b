use anyhow::Context;
use clap::Parser;
use scopes_engine::EngineConfig;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::{self};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "scopes-replay",
    about = "Replay a scripted search session and print every scope update as a JSON line."
)]
struct Args {
    /// JSON-lines script to replay, or `-` for stdin.
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// TOML engine config; defaults apply to missing keys.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let script: Box<dyn BufRead> = if args.script.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.script)
            .with_context(|| format!("failed to open script {}", args.script.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut stdout = io::stdout().lock();
    let steps = scopes_replay::run(config, script, &mut stdout)?;
    info!("replayed {steps} steps");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
