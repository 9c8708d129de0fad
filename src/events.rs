use std::fmt;

use image::RgbaImage;

use crate::fetch::FetchError;

/// One row of the image listing: a URL paired with its position among the
/// usable rows. The index survives into the manifest so consumers can join
/// packed tiles back to their source data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub original_index: u64,
    pub url: String,
}

/// A source image fetched, decoded, and normalized to the sprite size.
#[derive(Debug)]
pub struct NormalizedTile {
    pub record: SourceRecord,
    /// Exactly `sprite-size` pixels square.
    pub image: RgbaImage,
}

/// Why a record produced no tile. Drops are counted and reported at the end
/// of the run; they never abort it.
#[derive(Debug, Clone)]
pub enum DropReason {
    Fetch(FetchError),
    Decode(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "fetch failed: {err}"),
            Self::Decode(msg) => write!(f, "decode failed: {msg}"),
        }
    }
}

/// Result of one fetch worker, forwarded to the packer in completion order.
#[derive(Debug)]
pub enum FetchOutcome {
    Tile(NormalizedTile),
    Dropped {
        record: SourceRecord,
        reason: DropReason,
    },
}
