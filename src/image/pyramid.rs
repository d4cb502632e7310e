//! Tile-aligned Gaussian image pyramids.
//!
//! The base image is cropped so both sides are multiples of `2^levels` before
//! any downsampling. Every level then has integer dimensions and the response
//! tile grid stays aligned across levels, which the linear-memory layout
//! relies on. Downsampling is the standard separable 5-tap `[1 4 6 4 1]/16`
//! kernel with reflect-101 borders, sampled at even coordinates.

use crate::image::filter::reflect_101;
use crate::image::{OwnedImage, SourceImage};
use crate::util::{ShapeMatchError, ShapeMatchResult};

const PYR_KERNEL: [u32; 5] = [1, 4, 6, 4, 1];

/// Downsamples one plane by 2x with the 5-tap Gaussian kernel.
pub fn pyr_down(src: &OwnedImage<u8>) -> ShapeMatchResult<OwnedImage<u8>> {
    let src_width = src.width();
    let src_height = src.height();
    let width = src_width / 2;
    let height = src_height / 2;
    if width == 0 || height == 0 {
        return Err(ShapeMatchError::InvalidDimensions { width, height });
    }

    // Horizontal pass at full height, sampling even columns.
    let mut tmp = vec![0u32; width * src_height];
    for y in 0..src_height {
        let row = src.row(y);
        let out = &mut tmp[y * width..(y + 1) * width];
        for (x, dst) in out.iter_mut().enumerate() {
            let mut acc = 0u32;
            for (k, tap) in PYR_KERNEL.iter().enumerate() {
                let sx = reflect_101(2 * x as isize + k as isize - 2, src_width);
                acc += tap * row[sx] as u32;
            }
            *dst = acc;
        }
    }

    // Vertical pass sampling even rows; total weight is 16 * 16.
    let mut data = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0u32;
            for (k, tap) in PYR_KERNEL.iter().enumerate() {
                let sy = reflect_101(2 * y as isize + k as isize - 2, src_height);
                acc += tap * tmp[sy * width + x];
            }
            data[y * width + x] = ((acc + 128) / 256) as u8;
        }
    }

    OwnedImage::new(data, width, height)
}

/// Image pyramid with level 0 as the (cropped) base resolution.
pub struct ImagePyramid {
    levels: Vec<SourceImage>,
}

impl ImagePyramid {
    /// Builds `levels` pyramid levels from `src`.
    ///
    /// The source is cropped so each side is a multiple of `2^levels`; an
    /// image too small for that alignment is rejected.
    pub fn build(src: &SourceImage, levels: usize) -> ShapeMatchResult<Self> {
        let base = cropped_to_alignment(src, levels)?;

        let mut pyramid = Vec::with_capacity(levels);
        pyramid.push(base);
        for _ in 1..levels {
            let prev = pyramid.last().expect("pyramid is non-empty");
            pyramid.push(prev.map_planes(pyr_down)?);
        }

        Ok(Self { levels: pyramid })
    }

    /// Returns the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if the pyramid holds no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns a read-only reference to level `index` (0 = finest).
    pub fn level(&self, index: usize) -> &SourceImage {
        &self.levels[index]
    }
}

/// Crops a source so both sides are multiples of `2^levels`.
fn cropped_to_alignment(src: &SourceImage, levels: usize) -> ShapeMatchResult<SourceImage> {
    if levels == 0 {
        return Err(ShapeMatchError::InvalidInput {
            reason: "pyramid needs at least one level",
        });
    }
    let align = 1usize << levels;
    let width = (src.width() / align) * align;
    let height = (src.height() / align) * align;
    if width == 0 || height == 0 {
        return Err(ShapeMatchError::InvalidInput {
            reason: "image too small for the requested pyramid alignment",
        });
    }
    src.map_planes(|plane| plane.cropped(width, height))
}

/// Builds a mask pyramid by cropping and 2x2 any-valid decimation.
///
/// A coarse mask pixel is valid when any pixel of its 2x2 block is valid, so
/// thin masked regions survive at coarse levels.
pub fn build_mask_pyramid(
    mask: &OwnedImage<u8>,
    levels: usize,
) -> ShapeMatchResult<Vec<OwnedImage<u8>>> {
    if levels == 0 {
        return Err(ShapeMatchError::InvalidInput {
            reason: "pyramid needs at least one level",
        });
    }
    let align = 1usize << levels;
    let width = (mask.width() / align) * align;
    let height = (mask.height() / align) * align;
    if width == 0 || height == 0 {
        return Err(ShapeMatchError::InvalidInput {
            reason: "mask too small for the requested pyramid alignment",
        });
    }

    let mut pyramid = Vec::with_capacity(levels);
    pyramid.push(mask.cropped(width, height)?);
    for _ in 1..levels {
        let prev: &OwnedImage<u8> = pyramid.last().expect("mask pyramid is non-empty");
        let half_w = prev.width() / 2;
        let half_h = prev.height() / 2;
        let mut data = vec![0u8; half_w * half_h];
        for y in 0..half_h {
            let row0 = prev.row(2 * y);
            let row1 = prev.row(2 * y + 1);
            for (x, dst) in data[y * half_w..(y + 1) * half_w].iter_mut().enumerate() {
                let any = row0[2 * x] | row0[2 * x + 1] | row1[2 * x] | row1[2 * x + 1];
                *dst = if any != 0 { 255 } else { 0 };
            }
        }
        pyramid.push(OwnedImage::new(data, half_w, half_h)?);
    }

    Ok(pyramid)
}
