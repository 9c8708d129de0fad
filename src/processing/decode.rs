use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use image::{ImageFormat, ImageReader, RgbaImage};
use jpeg_decoder::{Decoder as JpegDecoder, PixelFormat};
use tracing::debug;

/// Decodes raw downloaded bytes to RGBA8 and applies EXIF orientation.
///
/// JPEG sources go through a scaled decode sized by `target` so a
/// multi-megapixel photo headed for a small sprite never materializes at
/// full resolution. Anything the fast path cannot handle falls back to the
/// general decoder.
pub fn decode_rgba8(bytes: &[u8], target: u32) -> Result<RgbaImage> {
    let format = image::guess_format(bytes).context("unrecognized image format")?;

    let mut img = if format == ImageFormat::Jpeg {
        match decode_jpeg_scaled(bytes, target) {
            Ok(img) => img,
            Err(err) => {
                debug!("scaled JPEG decode failed: {err:#}; falling back");
                decode_full(bytes)?
            }
        }
    } else {
        decode_full(bytes)?
    };

    // EXIF orientation correction, best effort. Unsupported values fall
    // through as-is.
    match read_orientation(bytes).unwrap_or(1) {
        1 => {}
        2 => img = image::imageops::flip_horizontal(&img),
        3 => img = image::imageops::rotate180(&img),
        4 => img = image::imageops::flip_vertical(&img),
        5 => {
            img = image::imageops::rotate90(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        6 => img = image::imageops::rotate90(&img),
        7 => {
            img = image::imageops::rotate270(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        8 => img = image::imageops::rotate270(&img),
        _ => {}
    }

    Ok(img)
}

fn decode_full(bytes: &[u8]) -> Result<RgbaImage> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?
        .decode()
        .context("failed to decode image")?;
    Ok(img.to_rgba8())
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    Some(value as u16)
}

// The scaled decoder may return dimensions above the request (it picks the
// nearest DCT scale); the normalizer handles exact sizing afterwards.
fn decode_jpeg_scaled(bytes: &[u8], target: u32) -> Result<RgbaImage> {
    use jpeg_decoder::Error as JpegError;

    let mut decoder = JpegDecoder::new(Cursor::new(bytes));
    let request = target.clamp(1, u16::MAX as u32) as u16;
    decoder.scale(request, request).map_err(|err| match err {
        JpegError::Unsupported(feature) => anyhow!("unsupported JPEG feature: {feature:?}"),
        other => anyhow!(other),
    })?;
    let pixels = decoder.decode().map_err(|err| match err {
        JpegError::Unsupported(feature) => anyhow!("unsupported JPEG feature: {feature:?}"),
        other => anyhow!(other),
    })?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("missing image info after JPEG decode"))?;
    let width = u32::from(info.width);
    let height = u32::from(info.height);

    let rgba = match info.pixel_format {
        PixelFormat::RGB24 => {
            let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
            for chunk in pixels.chunks_exact(3) {
                rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }
            rgba
        }
        PixelFormat::L8 => {
            let mut rgba = Vec::with_capacity(pixels.len() * 4);
            for &v in &pixels {
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
            rgba
        }
        PixelFormat::CMYK32 => {
            let mut rgba = Vec::with_capacity(pixels.len());
            for chunk in pixels.chunks_exact(4) {
                let c = chunk[0] as f32 / 255.0;
                let m = chunk[1] as f32 / 255.0;
                let y = chunk[2] as f32 / 255.0;
                let k = chunk[3] as f32 / 255.0;
                let c = c * (1.0 - k) + k;
                let m = m * (1.0 - k) + k;
                let y = y * (1.0 - k) + k;
                let r = ((1.0 - c) * 255.0).round().clamp(0.0, 255.0) as u8;
                let g = ((1.0 - m) * 255.0).round().clamp(0.0, 255.0) as u8;
                let b = ((1.0 - y) * 255.0).round().clamp(0.0, 255.0) as u8;
                rgba.extend_from_slice(&[r, g, b, 255]);
            }
            rgba
        }
        PixelFormat::L16 => {
            bail!("16-bit grayscale JPEGs are not supported by the scaled decoder");
        }
    };

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("failed to construct RGBA image from JPEG decode"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use image::Rgba;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn orient6_bytes() -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap()
    }

    #[test]
    fn applies_orientation_six() {
        let img = decode_rgba8(&orient6_bytes(), 128).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn decodes_png_with_alpha_intact() {
        let src = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 128]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(src.clone())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let img = decode_rgba8(&bytes, 128).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.as_raw(), src.as_raw());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(decode_rgba8(b"definitely not an image", 128).is_err());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(decode_rgba8(&[], 128).is_err());
    }
}
