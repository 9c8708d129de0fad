use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Result};
use serde::Deserialize;

/// Runtime configuration for an atlas generation run.
///
/// Defaults mirror the constants the tool has always shipped with: 128 px
/// sprites on 2048 px pages, twenty parallel fetches, a ten second request
/// timeout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// CSV file holding the image listing.
    pub input_csv: PathBuf,
    /// Header name of the column holding image URLs.
    pub url_column: String,
    /// Directory receiving atlas pages and the manifest.
    pub output_dir: PathBuf,
    /// Side length of one normalized sprite tile, in pixels.
    pub sprite_size: u32,
    /// Side length of one atlas page, in pixels. Must be a positive
    /// multiple of `sprite-size`.
    pub atlas_size: u32,
    /// Maximum number of images fetched concurrently.
    pub max_concurrent_fetches: usize,
    /// Optional cap on how many usable rows of the listing are processed.
    pub max_images: Option<usize>,
    /// Per-request timeout for image downloads.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// JPEG quality for atlas pages (1-100).
    pub jpeg_quality: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            input_csv: PathBuf::from("ufo_images.csv"),
            url_column: "Image_URL".to_string(),
            output_dir: PathBuf::from("sprites"),
            sprite_size: 128,
            atlas_size: 2048,
            max_concurrent_fetches: 20,
            max_images: None,
            fetch_timeout: Duration::from_secs(10),
            jpeg_quality: 85,
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Checks invariants that serde defaults alone cannot express.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.sprite_size > 0,
            "sprite-size must be greater than zero"
        );
        ensure!(
            self.atlas_size >= self.sprite_size,
            "atlas-size must be at least sprite-size"
        );
        ensure!(
            self.atlas_size % self.sprite_size == 0,
            "atlas-size must be a multiple of sprite-size"
        );
        ensure!(
            self.max_concurrent_fetches > 0,
            "max-concurrent-fetches must be greater than zero"
        );
        ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "jpeg-quality must be between 1 and 100"
        );
        ensure!(
            !self.url_column.trim().is_empty(),
            "url-column must not be empty"
        );
        ensure!(
            self.fetch_timeout > Duration::ZERO,
            "fetch-timeout must be positive"
        );
        Ok(self)
    }
}
