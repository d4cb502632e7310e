//! Orientation quantization: continuous angles to 16 labels, labels to a
//! locally dominant bitmask.
//!
//! Labels fold opposite gradient directions together: the circle is split
//! into 32 bins and bin `b` maps to label `b mod 16`, so a label names an
//! undirected orientation. The dominant-bitmask pass makes the downstream
//! spreading robust to isolated mislabeled pixels.

use crate::gradient::GradientMap;
use crate::image::OwnedImage;
use crate::util::{ShapeMatchError, ShapeMatchResult};

/// Sentinel label for pixels without a valid orientation.
pub const LABEL_NONE: u8 = 255;

/// Number of quantized orientation labels.
pub const NUM_LABELS: usize = 16;

/// Maps an angle in degrees [0, 360) to a label in [0, 16).
#[inline]
pub fn angle_to_label(angle_deg: f32) -> u8 {
    ((angle_deg * 32.0 / 360.0) as u32 & 15) as u8
}

/// Step A: builds the label map, dropping sub-threshold magnitudes.
///
/// Pixels outside the optional mask also receive [`LABEL_NONE`].
pub fn label_map(
    grad: &GradientMap,
    magnitude_threshold: f32,
    mask: Option<&OwnedImage<u8>>,
) -> ShapeMatchResult<OwnedImage<u8>> {
    let width = grad.width();
    let height = grad.height();
    if let Some(mask) = mask {
        if mask.width() != width || mask.height() != height {
            return Err(ShapeMatchError::MaskMismatch {
                img_width: width,
                img_height: height,
                mask_width: mask.width(),
                mask_height: mask.height(),
            });
        }
    }

    let magnitude = grad.magnitude().as_slice();
    let angle = grad.angle().as_slice();
    let mut labels = vec![LABEL_NONE; width * height];
    for (idx, label) in labels.iter_mut().enumerate() {
        if magnitude[idx] < magnitude_threshold {
            continue;
        }
        if let Some(mask) = mask {
            if mask.as_slice()[idx] == 0 {
                continue;
            }
        }
        *label = angle_to_label(angle[idx]);
    }

    OwnedImage::new(labels, width, height)
}

/// Step B: collapses the label map into a 16-bit dominant-orientation mask.
///
/// Bit `k` of the output is set when label `k` occurs at least
/// `threshold_count` times inside the centered `count_kernel_size` window.
/// Pixels that carry no label themselves emit 0 so the mask stays zero
/// wherever the underlying magnitude is sub-threshold.
pub fn dominant_bitmask(
    labels: &OwnedImage<u8>,
    count_kernel_size: usize,
    threshold_count: u32,
) -> ShapeMatchResult<OwnedImage<u16>> {
    if count_kernel_size % 2 == 0 || count_kernel_size == 0 {
        return Err(ShapeMatchError::InvalidConfig {
            reason: "count_kernel_size must be odd",
        });
    }
    if threshold_count == 0 {
        return Err(ShapeMatchError::InvalidConfig {
            reason: "threshold_count must be at least 1",
        });
    }

    let width = labels.width();
    let height = labels.height();
    let half = (count_kernel_size / 2) as isize;
    let mut out = vec![0u16; width * height];

    for y in 0..height {
        for x in 0..width {
            if labels.pixel(x, y) == LABEL_NONE {
                continue;
            }

            let mut counts = [0u32; NUM_LABELS];
            for dy in -half..=half {
                let sy = y as isize + dy;
                if sy < 0 || sy >= height as isize {
                    continue;
                }
                let row = labels.row(sy as usize);
                for dx in -half..=half {
                    let sx = x as isize + dx;
                    if sx < 0 || sx >= width as isize {
                        continue;
                    }
                    let label = row[sx as usize];
                    if label != LABEL_NONE {
                        counts[label as usize] += 1;
                    }
                }
            }

            let mut bits = 0u16;
            for (k, &count) in counts.iter().enumerate() {
                if count >= threshold_count {
                    bits |= 1 << k;
                }
            }
            out[y * width + x] = bits;
        }
    }

    OwnedImage::new(out, width, height)
}
