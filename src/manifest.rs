use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::error::Error;

/// One packed tile in the output manifest.
///
/// `u`/`v` give the top-left corner of the tile inside its page in
/// normalized coordinates; `w` and `h` give its extent and are always
/// equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub original_index: u64,
    pub atlas_index: u32,
    pub u: f64,
    pub v: f64,
    pub w: f64,
    pub h: f64,
}

/// Writes the manifest next to the atlas pages. Always produces a file,
/// also when `entries` is empty.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<(), Error> {
    write_json(path, entries).map_err(|source| Error::ManifestWrite { source })
}

fn write_json(path: &Path, entries: &[ManifestEntry]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, entries).context("failed to serialize manifest")?;
    out.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}
