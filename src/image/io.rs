//! Convenience helpers for loading images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Color images are split
//! into planar R, G, B buffers to match the internal representation.

use crate::image::{OwnedImage, SourceImage};
use crate::util::{ShapeMatchError, ShapeMatchResult};
use std::path::Path;

/// Creates a gray source from a grayscale image buffer.
pub fn source_from_gray_image(img: &image::GrayImage) -> ShapeMatchResult<SourceImage> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    Ok(SourceImage::gray(OwnedImage::new(
        img.as_raw().clone(),
        width,
        height,
    )?))
}

/// Creates a planar RGB source from an interleaved RGB image buffer.
pub fn source_from_rgb_image(img: &image::RgbImage) -> ShapeMatchResult<SourceImage> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let raw = img.as_raw();
    let mut planes = [
        Vec::with_capacity(width * height),
        Vec::with_capacity(width * height),
        Vec::with_capacity(width * height),
    ];
    for px in raw.chunks_exact(3) {
        planes[0].push(px[0]);
        planes[1].push(px[1]);
        planes[2].push(px[2]);
    }
    let [r, g, b] = planes;
    SourceImage::rgb([
        OwnedImage::new(r, width, height)?,
        OwnedImage::new(g, width, height)?,
        OwnedImage::new(b, width, height)?,
    ])
}

/// Creates a mask from a grayscale image buffer (zero = excluded).
pub fn mask_from_gray_image(img: &image::GrayImage) -> ShapeMatchResult<OwnedImage<u8>> {
    OwnedImage::new(
        img.as_raw().clone(),
        img.width() as usize,
        img.height() as usize,
    )
}

/// Loads an image from disk, keeping color when present.
pub fn load_source<P: AsRef<Path>>(path: P) -> ShapeMatchResult<SourceImage> {
    let img = image::open(path).map_err(|err| ShapeMatchError::ImageIo {
        reason: err.to_string(),
    })?;
    match img {
        image::DynamicImage::ImageLuma8(gray) => source_from_gray_image(&gray),
        other => source_from_rgb_image(&other.to_rgb8()),
    }
}

/// Loads an image from disk and converts it to a gray source.
pub fn load_gray<P: AsRef<Path>>(path: P) -> ShapeMatchResult<SourceImage> {
    let img = image::open(path).map_err(|err| ShapeMatchError::ImageIo {
        reason: err.to_string(),
    })?;
    source_from_gray_image(&img.to_luma8())
}
