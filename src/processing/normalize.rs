use anyhow::{ensure, Context, Result};
use fast_image_resize as fir;
use image::{imageops, RgbaImage};

/// Scales `source` so a `target` square is fully covered, then crops the
/// overflow evenly from both sides. The result is always exactly
/// `target` x `target`; a source already at that size comes back
/// pixel-identical.
///
/// Scaled dimensions are rounded to the nearest pixel and clamped to at
/// least `target` so the crop window always fits. Crop offsets truncate.
pub fn normalize_to_square(source: &RgbaImage, target: u32) -> Result<RgbaImage> {
    ensure!(target > 0, "target size must be positive");
    ensure!(
        source.width() > 0 && source.height() > 0,
        "source image must be non-empty"
    );

    if source.dimensions() == (target, target) {
        return Ok(source.clone());
    }

    let ratio = f64::from(target) / f64::from(source.width());
    let ratio = ratio.max(f64::from(target) / f64::from(source.height()));
    let scaled_w = ((f64::from(source.width()) * ratio).round() as u32).max(target);
    let scaled_h = ((f64::from(source.height()) * ratio).round() as u32).max(target);

    let resized = resize_rgba(source, scaled_w, scaled_h)?;
    if resized.dimensions() == (target, target) {
        return Ok(resized);
    }

    let crop_x = (scaled_w - target) / 2;
    let crop_y = (scaled_h - target) / 2;
    Ok(imageops::crop_imm(&resized, crop_x, crop_y, target, target).to_image())
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    if source.dimensions() == (target_w, target_h) {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for sprite resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("sprite resize failed")?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}
