use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::atlas::{AtlasBuilder, AtlasPage, GridLayout};
use crate::config::Configuration;
use crate::error::Error;
use crate::events::FetchOutcome;
use crate::fetch::TileFetcher;
use crate::input;
use crate::manifest;
use crate::tasks::{fetcher, packer, writer};

/// Final tallies of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: u64,
    pub packed: u64,
    pub dropped_fetch: u64,
    pub dropped_decode: u64,
    pub pages: u32,
    pub elapsed: Duration,
}

/// Runs the whole pipeline: read the listing, fetch and normalize with
/// bounded concurrency, pack in completion order, write pages as they
/// fill, then emit the manifest.
///
/// Tile layout varies between runs: tiles land in the order fetches
/// complete. Consumers locate tiles through the manifest, which is keyed
/// by `original_index`, never through slot positions.
pub async fn run<F>(
    cfg: &Configuration,
    fetcher_impl: F,
    cancel: CancellationToken,
) -> Result<RunSummary, Error>
where
    F: TileFetcher + 'static,
{
    let started = Instant::now();

    std::fs::create_dir_all(&cfg.output_dir)?;
    let records = input::read_records(&cfg.input_csv, &cfg.url_column, cfg.max_images)?;
    let total = records.len() as u64;
    info!(
        total,
        workers = cfg.max_concurrent_fetches,
        "loaded image listing from {}",
        cfg.input_csv.display()
    );

    let layout = GridLayout::new(cfg.sprite_size, cfg.atlas_size);
    debug!(
        sprite = layout.sprite_size(),
        atlas = layout.atlas_size(),
        capacity = layout.capacity(),
        "atlas grid layout"
    );

    // Bounded channels: outcomes sized to the worker pool, pages kept small
    // so at most a couple of finished pages wait on the encoder.
    let (results_tx, results_rx) = mpsc::channel::<FetchOutcome>(cfg.max_concurrent_fetches);
    let (pages_tx, pages_rx) = mpsc::channel::<AtlasPage>(2);

    let fetch_handle = tokio::spawn(fetcher::run(
        records,
        fetcher_impl,
        cfg.sprite_size,
        cfg.max_concurrent_fetches,
        results_tx,
        cancel,
    ));
    let pack_handle = tokio::spawn(packer::run(
        results_rx,
        pages_tx,
        AtlasBuilder::new(layout),
        total,
    ));
    let write_handle = tokio::spawn(writer::run(
        pages_rx,
        cfg.output_dir.clone(),
        cfg.jpeg_quality,
    ));

    // A writer failure closes the page channel, which unwinds the packer
    // and fetcher through their send errors; the writer's error takes
    // precedence.
    let fetch_res = fetch_handle.await;
    let pack_res = pack_handle.await;
    let write_res = write_handle.await;

    match fetch_res {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("fetch task error: {err:?}"),
        Err(err) => warn!("fetch task join error: {err}"),
    }

    let pages = match write_res {
        Ok(result) => result?,
        Err(err) => return Err(Error::Pipeline(format!("writer task panicked: {err}"))),
    };
    let (report, entries) = match pack_res {
        Ok(Ok(pair)) => pair,
        Ok(Err(err)) => return Err(Error::Pipeline(format!("packer task failed: {err}"))),
        Err(err) => return Err(Error::Pipeline(format!("packer task panicked: {err}"))),
    };

    let manifest_path = cfg.output_dir.join("manifest.json");
    manifest::write_manifest(&manifest_path, &entries)?;
    info!(
        entries = entries.len(),
        path = %manifest_path.display(),
        "wrote manifest"
    );

    Ok(RunSummary {
        total,
        packed: report.packed,
        dropped_fetch: report.dropped_fetch,
        dropped_decode: report.dropped_decode,
        pages,
        elapsed: started.elapsed(),
    })
}
