use image::{RgbImage, RgbaImage};

/// Composites an RGBA page onto opaque black.
///
/// Atlas pages ship as JPEG, which carries no alpha channel, so every
/// pixel is alpha-weighted against a black background before encoding.
/// Unfilled slots are fully transparent and come out pure black.
pub fn flatten_onto_black(page: &RgbaImage) -> RgbImage {
    let (width, height) = page.dimensions();
    let mut out = RgbImage::new(width, height);
    for (src, dst) in page.chunks_exact(4).zip(out.chunks_exact_mut(3)) {
        let a = u16::from(src[3]);
        dst[0] = ((u16::from(src[0]) * a) / 255) as u8;
        dst[1] = ((u16::from(src[1]) * a) / 255) as u8;
        dst[2] = ((u16::from(src[2]) * a) / 255) as u8;
    }
    out
}
