use image::{imageops, RgbaImage};

use crate::manifest::ManifestEntry;

/// Geometry shared by every page of a run.
///
/// Pages are a fixed grid of square slots filled left to right, top to
/// bottom. `atlas_size` must be a positive multiple of `sprite_size`; the
/// configuration layer enforces that before a layout is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    sprite_size: u32,
    atlas_size: u32,
    cols: u32,
    capacity: u32,
}

impl GridLayout {
    pub fn new(sprite_size: u32, atlas_size: u32) -> Self {
        debug_assert!(sprite_size > 0 && atlas_size % sprite_size == 0);
        let cols = atlas_size / sprite_size;
        Self {
            sprite_size,
            atlas_size,
            cols,
            capacity: cols * cols,
        }
    }

    pub fn sprite_size(&self) -> u32 {
        self.sprite_size
    }

    pub fn atlas_size(&self) -> u32 {
        self.atlas_size
    }

    /// Tiles one page can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Pixel origin of a slot within its page.
    fn slot_origin(&self, slot: u32) -> (u32, u32) {
        let row = slot / self.cols;
        let col = slot % self.cols;
        (col * self.sprite_size, row * self.sprite_size)
    }

    /// Normalized UV corner and side length of a slot. `u` and `v` lie in
    /// `[0, 1)`; the side is the same for both axes.
    fn slot_uv(&self, slot: u32) -> (f64, f64, f64) {
        let (x, y) = self.slot_origin(slot);
        let atlas = f64::from(self.atlas_size);
        (
            f64::from(x) / atlas,
            f64::from(y) / atlas,
            f64::from(self.sprite_size) / atlas,
        )
    }
}

/// One fixed-grid page, either under construction or ready for encoding.
///
/// Unfilled slots stay fully transparent; the writer composites them to
/// black when the page is flattened for JPEG output.
#[derive(Debug)]
pub struct AtlasPage {
    pub index: u32,
    pub image: RgbaImage,
    pub fill_count: u32,
}

/// Owns every mutable piece of packing state: the open page, the page
/// counter, and the manifest entries accumulated so far. Tiles go in
/// through [`place`](Self::place); pages come out by value the moment they
/// fill.
pub struct AtlasBuilder {
    layout: GridLayout,
    next_index: u32,
    open: Option<AtlasPage>,
    entries: Vec<ManifestEntry>,
}

impl AtlasBuilder {
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            next_index: 0,
            open: None,
            entries: Vec::new(),
        }
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    /// Tiles placed so far, across all pages.
    pub fn placed(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Pastes a tile into the next free slot and records its manifest
    /// entry. Returns the page by value exactly when this placement fills
    /// it.
    ///
    /// `tile` must be `sprite_size` square.
    pub fn place(&mut self, original_index: u64, tile: &RgbaImage) -> Option<AtlasPage> {
        debug_assert_eq!(
            tile.dimensions(),
            (self.layout.sprite_size, self.layout.sprite_size)
        );

        let page = self.open.get_or_insert_with(|| AtlasPage {
            index: self.next_index,
            image: RgbaImage::new(self.layout.atlas_size, self.layout.atlas_size),
            fill_count: 0,
        });

        let slot = page.fill_count;
        let (x, y) = self.layout.slot_origin(slot);
        imageops::replace(&mut page.image, tile, i64::from(x), i64::from(y));

        let (u, v, side) = self.layout.slot_uv(slot);
        self.entries.push(ManifestEntry {
            original_index,
            atlas_index: page.index,
            u,
            v,
            w: side,
            h: side,
        });
        page.fill_count += 1;

        if page.fill_count == self.layout.capacity {
            self.next_index += 1;
            self.open.take()
        } else {
            None
        }
    }

    /// Closes the builder, yielding the partially filled page (if any tile
    /// landed on it) and the accumulated manifest.
    pub fn finish(mut self) -> (Option<AtlasPage>, Vec<ManifestEntry>) {
        let partial = self.open.take();
        (partial, self.entries)
    }
}
