use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sprite_atlas::config::Configuration;
use sprite_atlas::fetch::HttpFetcher;
use sprite_atlas::pipeline;

#[derive(Debug, Parser)]
#[command(
    name = "sprite-atlas",
    version,
    about = "packs remote images into fixed-grid sprite atlas pages"
)]
struct Args {
    /// Path to YAML config; built-in defaults apply if the file is absent
    #[arg(long, value_name = "CONFIG", default_value = "config.yaml")]
    config: PathBuf,
    /// CSV listing to read (overrides the config file)
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
    /// Output directory (overrides the config file)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Cap on the number of listed images (overrides the config file)
    #[arg(long, value_name = "N")]
    max_images: Option<usize>,
    /// Concurrent fetch limit (overrides the config file)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // init tracing (RUST_LOG overrides, -v raises the default level)
    let default_directives = match args.verbose {
        0 => "info",
        1 => "info,sprite_atlas=debug",
        _ => "debug,sprite_atlas=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directives)),
        )
        .with_target(false)
        .compact()
        .init();

    let mut cfg = if args.config.exists() {
        Configuration::from_yaml_file(&args.config).with_context(|| {
            format!("failed to load configuration from {}", args.config.display())
        })?
    } else {
        tracing::debug!("no config file at {}; using defaults", args.config.display());
        Configuration::default()
    };
    if let Some(input) = args.input {
        cfg.input_csv = input;
    }
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }
    if let Some(max) = args.max_images {
        cfg.max_images = Some(max);
    }
    if let Some(workers) = args.workers {
        cfg.max_concurrent_fetches = workers;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("configuration: {cfg:#?}");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; finishing in-flight fetches");
            cancel.cancel();
        });
    }

    let fetcher = HttpFetcher::new(cfg.fetch_timeout)?;
    let summary = pipeline::run(&cfg, fetcher, cancel).await?;

    let elapsed = std::time::Duration::from_millis(summary.elapsed.as_millis() as u64);
    tracing::info!(
        total = summary.total,
        packed = summary.packed,
        dropped_fetch = summary.dropped_fetch,
        dropped_decode = summary.dropped_decode,
        pages = summary.pages,
        "run complete in {}",
        humantime::format_duration(elapsed)
    );
    Ok(())
}
