use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use image::codecs::jpeg::JpegEncoder;
use tokio::sync::mpsc::Receiver;
use tracing::info;

use crate::atlas::AtlasPage;
use crate::error::Error;
use crate::processing::flatten;

/// Receives finished pages and persists each as `atlas_{index}.jpg`.
///
/// Flattening and JPEG encoding run on the blocking pool. The first
/// failure is fatal for the whole run; pages written before it stay on
/// disk. Returns the number of pages written.
pub async fn run(
    mut pages_rx: Receiver<AtlasPage>,
    output_dir: PathBuf,
    quality: u8,
) -> Result<u32, Error> {
    let mut written = 0u32;

    while let Some(page) = pages_rx.recv().await {
        let index = page.index;
        let tiles = page.fill_count;
        let path = output_dir.join(format!("atlas_{index}.jpg"));
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_page(&page, &target, quality))
            .await
            .map_err(|err| Error::PageWrite {
                index,
                source: anyhow!("encode task failed: {err}"),
            })?
            .map_err(|source| Error::PageWrite { index, source })?;

        written += 1;
        info!(page = index, tiles, path = %path.display(), "saved atlas page");
    }

    Ok(written)
}

fn write_page(page: &AtlasPage, path: &Path, quality: u8) -> anyhow::Result<()> {
    let rgb = flatten::flatten_onto_black(&page.image);
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .context("JPEG encode failed")?;
    out.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasBuilder, GridLayout};
    use image::{Rgba, RgbaImage};
    use tokio::sync::mpsc;

    fn full_page(sprite: u32, atlas: u32) -> AtlasPage {
        let mut builder = AtlasBuilder::new(GridLayout::new(sprite, atlas));
        let tile = RgbaImage::from_pixel(sprite, sprite, Rgba([80, 90, 100, 255]));
        let capacity = builder.layout().capacity();
        for i in 0..u64::from(capacity) - 1 {
            assert!(builder.place(i, &tile).is_none());
        }
        builder
            .place(u64::from(capacity) - 1, &tile)
            .expect("page should fill")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn writes_pages_until_channel_closes() {
        let dir = tempfile::tempdir().unwrap();
        let (pages_tx, pages_rx) = mpsc::channel(2);
        let handle = tokio::spawn(run(pages_rx, dir.path().to_path_buf(), 85));

        pages_tx.send(full_page(8, 16)).await.unwrap();
        drop(pages_tx);

        let written = handle.await.unwrap().unwrap();
        assert_eq!(written, 1);

        let saved = image::open(dir.path().join("atlas_0.jpg")).unwrap();
        assert_eq!(saved.width(), 16);
        assert_eq!(saved.height(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unwritable_page_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // a directory squatting on the target name makes File::create fail
        std::fs::create_dir(dir.path().join("atlas_0.jpg")).unwrap();

        let (pages_tx, pages_rx) = mpsc::channel(2);
        let handle = tokio::spawn(run(pages_rx, dir.path().to_path_buf(), 85));
        pages_tx.send(full_page(8, 16)).await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::PageWrite { index: 0, .. }));
    }
}
