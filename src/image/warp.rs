//! Border padding and center-anchored affine warps.
//!
//! The shape-info producer pads templates so that no rotation or scale inside
//! the configured ranges can clip content, then samples rotated/scaled copies
//! with bilinear (image) or nearest (mask) interpolation. Positive angles
//! rotate counter-clockwise; the warp maps destination pixels back through
//! the inverse transform about the image center.

use crate::image::OwnedImage;
use crate::util::math::sin_cos_deg;

/// Border fill mode for [`pad`].
#[derive(Copy, Clone, Debug)]
pub enum BorderMode {
    /// Repeat the nearest edge pixel.
    Replicate,
    /// Fill with a constant value.
    Constant(u8),
}

/// Pads an image with `top/bottom/left/right` extra pixels.
pub fn pad(
    src: &OwnedImage<u8>,
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
    mode: BorderMode,
) -> OwnedImage<u8> {
    let width = src.width() + left + right;
    let height = src.height() + top + bottom;
    let fill = match mode {
        BorderMode::Replicate => 0,
        BorderMode::Constant(v) => v,
    };
    let mut out = OwnedImage::filled(width, height, fill).expect("padded dimensions are non-zero");

    for y in 0..height {
        let src_y = match mode {
            BorderMode::Replicate => y.saturating_sub(top).min(src.height() - 1),
            BorderMode::Constant(_) => {
                if y < top || y >= top + src.height() {
                    continue;
                }
                y - top
            }
        };
        let src_row = src.row(src_y);
        let dst_row = out.row_mut(y);
        match mode {
            BorderMode::Replicate => {
                for (x, dst) in dst_row.iter_mut().enumerate() {
                    let src_x = x.saturating_sub(left).min(src_row.len() - 1);
                    *dst = src_row[src_x];
                }
            }
            BorderMode::Constant(_) => {
                dst_row[left..left + src_row.len()].copy_from_slice(src_row);
            }
        }
    }

    out
}

/// Inverse-map coefficients for a rotate+scale warp about the image center.
struct InverseMap {
    cos_s: f32,
    sin_s: f32,
    cx: f32,
    cy: f32,
}

impl InverseMap {
    fn new(width: usize, height: usize, angle_deg: f32, scale: f32) -> Self {
        let (sin_a, cos_a) = sin_cos_deg(angle_deg);
        Self {
            cos_s: cos_a / scale,
            sin_s: sin_a / scale,
            cx: (width / 2) as f32,
            cy: (height / 2) as f32,
        }
    }

    #[inline]
    fn apply(&self, x: usize, y: usize) -> (f32, f32) {
        let dx = x as f32 - self.cx;
        let dy = y as f32 - self.cy;
        (
            self.cos_s * dx - self.sin_s * dy + self.cx,
            self.sin_s * dx + self.cos_s * dy + self.cy,
        )
    }
}

/// Rotates and scales an image about its center using bilinear sampling.
///
/// Samples falling outside the source are filled with `fill`.
pub fn warp_bilinear(src: &OwnedImage<u8>, angle_deg: f32, scale: f32, fill: u8) -> OwnedImage<u8> {
    let width = src.width();
    let height = src.height();
    let map = InverseMap::new(width, height, angle_deg, scale);
    let max_x = width as f32 - 1.0;
    let max_y = height as f32 - 1.0;
    let mut out = vec![fill; width * height];

    for y in 0..height {
        for x in 0..width {
            let (src_x, src_y) = map.apply(x, y);
            if !src_x.is_finite()
                || !src_y.is_finite()
                || src_x < 0.0
                || src_y < 0.0
                || src_x > max_x
                || src_y > max_y
            {
                continue;
            }

            let x0 = src_x.floor() as usize;
            let y0 = src_y.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let y1 = (y0 + 1).min(height - 1);
            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let row0 = src.row(y0);
            let row1 = src.row(y1);
            let value = row0[x0] as f32 * (1.0 - fx) * (1.0 - fy)
                + row0[x1] as f32 * fx * (1.0 - fy)
                + row1[x0] as f32 * (1.0 - fx) * fy
                + row1[x1] as f32 * fx * fy;

            out[y * width + x] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    OwnedImage::new(out, width, height).expect("warp output is contiguous")
}

/// Rotates and scales a mask about its center using nearest sampling.
///
/// Samples falling outside the source are filled with zero (excluded).
pub fn warp_nearest(src: &OwnedImage<u8>, angle_deg: f32, scale: f32) -> OwnedImage<u8> {
    let width = src.width();
    let height = src.height();
    let map = InverseMap::new(width, height, angle_deg, scale);
    let mut out = vec![0u8; width * height];

    for y in 0..height {
        for x in 0..width {
            let (src_x, src_y) = map.apply(x, y);
            let sx = src_x.round();
            let sy = src_y.round();
            if sx < 0.0 || sy < 0.0 || sx >= width as f32 || sy >= height as f32 {
                continue;
            }
            out[y * width + x] = src.pixel(sx as usize, sy as usize);
        }
    }

    OwnedImage::new(out, width, height).expect("warp output is contiguous")
}

#[cfg(test)]
mod tests {
    use super::{pad, warp_bilinear, warp_nearest, BorderMode};
    use crate::image::OwnedImage;

    #[test]
    fn replicate_pad_repeats_edges() {
        let img = OwnedImage::new(vec![1u8, 2, 3, 4], 2, 2).unwrap();
        let padded = pad(&img, 1, 1, 1, 1, BorderMode::Replicate);
        assert_eq!(padded.width(), 4);
        assert_eq!(padded.row(0), &[1, 1, 2, 2]);
        assert_eq!(padded.row(3), &[3, 3, 4, 4]);
    }

    #[test]
    fn constant_pad_fills_border() {
        let img = OwnedImage::new(vec![9u8; 4], 2, 2).unwrap();
        let padded = pad(&img, 1, 1, 1, 1, BorderMode::Constant(0));
        assert_eq!(padded.row(0), &[0, 0, 0, 0]);
        assert_eq!(padded.row(1), &[0, 9, 9, 0]);
    }

    #[test]
    fn identity_warp_is_lossless() {
        let data: Vec<u8> = (0..49).map(|v| (v * 5 % 251) as u8).collect();
        let img = OwnedImage::new(data.clone(), 7, 7).unwrap();
        let warped = warp_bilinear(&img, 0.0, 1.0, 0);
        assert_eq!(warped.as_slice(), data.as_slice());
        let warped = warp_nearest(&img, 0.0, 1.0);
        assert_eq!(warped.as_slice(), data.as_slice());
    }

    #[test]
    fn quarter_turn_moves_point_counter_clockwise() {
        let mut img = OwnedImage::filled(9, 9, 0u8).unwrap();
        // A point to the right of center should end up above it after +90 deg.
        img.set_pixel(7, 4, 200);
        let warped = warp_nearest(&img, 90.0, 1.0);
        assert_eq!(warped.pixel(4, 1), 200);
    }
}
