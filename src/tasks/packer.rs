use anyhow::Result;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, info};

use crate::atlas::{AtlasBuilder, AtlasPage};
use crate::events::{DropReason, FetchOutcome};
use crate::manifest::ManifestEntry;

/// Tallies of one packing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackReport {
    pub packed: u64,
    pub dropped_fetch: u64,
    pub dropped_decode: u64,
}

/// Consumes fetch outcomes and packs tiles in arrival order.
///
/// This task is the single owner of all packing state, so placement and
/// manifest bookkeeping need no lock. Full pages are handed to the writer
/// channel; nothing here ever touches the filesystem. When the outcome
/// channel closes, the partially filled page (if any) is flushed and the
/// report plus the manifest entries are returned.
pub async fn run(
    mut results_rx: Receiver<FetchOutcome>,
    pages_tx: Sender<AtlasPage>,
    mut builder: AtlasBuilder,
    total: u64,
) -> Result<(PackReport, Vec<ManifestEntry>)> {
    let mut report = PackReport::default();
    let mut done: u64 = 0;

    while let Some(outcome) = results_rx.recv().await {
        done += 1;
        match outcome {
            FetchOutcome::Tile(tile) => {
                let full = builder.place(tile.record.original_index, &tile.image);
                if let Some(page) = full {
                    debug!(page = page.index, "atlas page filled");
                    if pages_tx.send(page).await.is_err() {
                        debug!("page writer stopped; abandoning packing");
                        break;
                    }
                }
            }
            FetchOutcome::Dropped { record, reason } => {
                match reason {
                    DropReason::Fetch(_) => report.dropped_fetch += 1,
                    DropReason::Decode(_) => report.dropped_decode += 1,
                }
                debug!(
                    index = record.original_index,
                    url = %record.url,
                    "dropped: {reason}"
                );
            }
        }
        if done % 100 == 0 {
            info!("processed {done}/{total} images");
        }
    }

    report.packed = builder.placed();
    let (partial, entries) = builder.finish();
    if let Some(page) = partial {
        debug!(page = page.index, tiles = page.fill_count, "flushing partial page");
        let _ = pages_tx.send(page).await;
    }

    Ok((report, entries))
}
