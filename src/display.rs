//! Page image preparation for the terminal: decode, shrink to fit, re-encode
//! as PNG (the only format Kitty's `f=100` transfer accepts).

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use log::debug;

/// PNG ready to send, with its pixel size.
pub struct DisplayImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode `content` and halve it until it is at most `max_width` pixels wide.
///
/// Halving (rather than scaling straight to the target) keeps strips crisp
/// and matches what readers of these comics are used to.
pub fn prepare(content: &[u8], max_width: u32) -> Result<DisplayImage> {
    let mut img = image::load_from_memory(content).context("failed to decode page image")?;
    let (orig_w, orig_h) = (img.width(), img.height());
    while max_width > 0 && img.width() > max_width {
        img = halve(&img);
    }
    if img.width() != orig_w {
        debug!(
            "display: scaled {orig_w}x{orig_h} -> {}x{} (max width {max_width})",
            img.width(),
            img.height()
        );
    }

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(DisplayImage {
        png,
        width: img.width(),
        height: img.height(),
    })
}

fn halve(img: &DynamicImage) -> DynamicImage {
    img.resize_exact(
        (img.width() / 2).max(1),
        (img.height() / 2).max(1),
        FilterType::Triangle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[test]
    fn small_image_untouched() {
        let shown = prepare(&png(100, 300), 800).unwrap();
        assert_eq!((shown.width, shown.height), (100, 300));
        assert_eq!(&shown.png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn wide_image_halved_until_it_fits() {
        let shown = prepare(&png(1000, 400), 300).unwrap();
        // 1000 -> 500 -> 250
        assert_eq!((shown.width, shown.height), (250, 100));
    }

    #[test]
    fn zero_max_width_means_unbounded() {
        let shown = prepare(&png(64, 8), 0).unwrap();
        assert_eq!(shown.width, 64);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(prepare(b"not an image", 100).is_err());
    }
}
