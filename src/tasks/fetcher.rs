use std::sync::Arc;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{DropReason, FetchOutcome, NormalizedTile, SourceRecord};
use crate::fetch::TileFetcher;
use crate::processing::{decode, normalize};

/// Fetches, decodes, and normalizes one record. Every record yields
/// exactly one outcome; failures become [`FetchOutcome::Dropped`].
pub async fn fetch_one<F: TileFetcher>(
    fetcher: &F,
    record: SourceRecord,
    sprite_size: u32,
) -> FetchOutcome {
    let bytes = match fetcher.fetch(&record.url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return FetchOutcome::Dropped {
                record,
                reason: DropReason::Fetch(err),
            };
        }
    };

    // Decode and resample are CPU-bound; keep them off the async workers.
    let decoded = tokio::task::spawn_blocking(move || {
        let decoded = decode::decode_rgba8(&bytes, sprite_size)?;
        normalize::normalize_to_square(&decoded, sprite_size)
    })
    .await;

    match decoded {
        Ok(Ok(image)) => FetchOutcome::Tile(NormalizedTile { record, image }),
        Ok(Err(err)) => FetchOutcome::Dropped {
            record,
            reason: DropReason::Decode(format!("{err:#}")),
        },
        Err(err) => FetchOutcome::Dropped {
            record,
            reason: DropReason::Decode(format!("decode task failed: {err}")),
        },
    }
}

/// Drives up to `max_in_flight` concurrent fetches over `records` and
/// forwards outcomes in completion order.
///
/// Cancellation stops the submission of new records; fetches already in
/// flight run to completion so their outcomes are still accounted for.
/// The task ends once every submitted record has produced an outcome, or
/// as soon as the outcome channel closes underneath it.
pub async fn run<F>(
    records: Vec<SourceRecord>,
    fetcher: F,
    sprite_size: u32,
    max_in_flight: usize,
    results_tx: Sender<FetchOutcome>,
    cancel: CancellationToken,
) -> Result<()>
where
    F: TileFetcher + 'static,
{
    let fetcher = Arc::new(fetcher);
    let mut pending = records.into_iter();
    let mut in_flight = 0usize;
    let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();
    let mut cancelled = false;

    loop {
        // Keep the pool full while submission is allowed.
        while !cancelled && in_flight < max_in_flight {
            let Some(record) = pending.next() else { break };
            let fetcher = Arc::clone(&fetcher);
            tasks.spawn(async move { fetch_one(fetcher.as_ref(), record, sprite_size).await });
            in_flight += 1;
        }

        if in_flight == 0 {
            break;
        }

        select! {
            _ = cancel.cancelled(), if !cancelled => {
                debug!("cancellation requested; draining in-flight fetches");
                cancelled = true;
            }
            Some(join_res) = tasks.join_next() => {
                in_flight -= 1;
                match join_res {
                    Ok(outcome) => {
                        if results_tx.send(outcome).await.is_err() {
                            debug!("outcome consumer gone; stopping fetches");
                            break;
                        }
                    }
                    Err(err) => debug!("fetch task join failed: {err}"),
                }
            }
        }
    }

    Ok(())
}
