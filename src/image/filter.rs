//! Separable convolution primitives used by the gradient modality.
//!
//! All filters use reflect-101 borders (`dcb|abcdef|edc`), matching the
//! conventional behavior of image-library implementations so the gradient
//! maps stay consistent across template and search images.

use crate::image::{ImageView, OwnedImage};

/// Reflect-101 index mapping for a coordinate that may fall outside `[0, len)`.
#[inline]
pub(crate) fn reflect_101(idx: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    let len = len as isize;
    let mut idx = idx;
    if len == 1 {
        return 0;
    }
    while idx < 0 || idx >= len {
        if idx < 0 {
            idx = -idx;
        }
        if idx >= len {
            idx = 2 * (len - 1) - idx;
        }
    }
    idx as usize
}

/// Samples a 5-tap Gaussian kernel for the given sigma, normalized to sum 1.
fn gaussian_kernel_5(sigma: f32) -> [f32; 5] {
    let mut kernel = [0.0f32; 5];
    let denom = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, tap) in kernel.iter_mut().enumerate() {
        let d = i as f32 - 2.0;
        *tap = (-d * d / denom).exp();
        sum += *tap;
    }
    for tap in kernel.iter_mut() {
        *tap /= sum;
    }
    kernel
}

/// Applies a separable 5x5 Gaussian blur, widening `u8` input to `f32`.
pub fn gaussian_blur_5(src: ImageView<'_, u8>, sigma: f32) -> OwnedImage<f32> {
    let width = src.width();
    let height = src.height();
    let kernel = gaussian_kernel_5(sigma);

    // Horizontal pass.
    let mut tmp = vec![0.0f32; width * height];
    for y in 0..height {
        let row = src.row(y);
        let out = &mut tmp[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, tap) in kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - 2, width);
                acc += tap * row[sx] as f32;
            }
            out[x] = acc;
        }
    }

    // Vertical pass.
    let mut data = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, tap) in kernel.iter().enumerate() {
                let sy = reflect_101(y as isize + k as isize - 2, height);
                acc += tap * tmp[sy * width + x];
            }
            data[y * width + x] = acc;
        }
    }

    OwnedImage::new(data, width, height).expect("blur output is contiguous")
}

/// 3x3 derivative pair with smoothing taps `smooth` and difference `[-1, 0, 1]`.
///
/// `smooth = [1, 2, 1]` yields Sobel, `[3, 10, 3]` yields Scharr.
fn derivative_3x3(src: &OwnedImage<f32>, smooth: [f32; 3]) -> (OwnedImage<f32>, OwnedImage<f32>) {
    let width = src.width();
    let height = src.height();
    let mut gx = vec![0.0f32; width * height];
    let mut gy = vec![0.0f32; width * height];

    for y in 0..height {
        let ym = src.row(reflect_101(y as isize - 1, height));
        let y0 = src.row(y);
        let yp = src.row(reflect_101(y as isize + 1, height));
        for x in 0..width {
            let xm = reflect_101(x as isize - 1, width);
            let xp = reflect_101(x as isize + 1, width);

            gx[y * width + x] = smooth[0] * (ym[xp] - ym[xm])
                + smooth[1] * (y0[xp] - y0[xm])
                + smooth[2] * (yp[xp] - yp[xm]);
            gy[y * width + x] = smooth[0] * (yp[xm] - ym[xm])
                + smooth[1] * (yp[x] - ym[x])
                + smooth[2] * (yp[xp] - ym[xp]);
        }
    }

    (
        OwnedImage::new(gx, width, height).expect("gx output is contiguous"),
        OwnedImage::new(gy, width, height).expect("gy output is contiguous"),
    )
}

/// Computes the 3x3 Sobel derivative pair `(gx, gy)`.
pub fn sobel_3x3(src: &OwnedImage<f32>) -> (OwnedImage<f32>, OwnedImage<f32>) {
    derivative_3x3(src, [1.0, 2.0, 1.0])
}

/// Computes the 3x3 Scharr derivative pair `(gx, gy)` directly from `u8` data.
pub fn scharr_3x3(src: ImageView<'_, u8>) -> (OwnedImage<f32>, OwnedImage<f32>) {
    let widened: Vec<f32> = (0..src.height())
        .flat_map(|y| src.row(y).iter().map(|&v| v as f32))
        .collect();
    let widened =
        OwnedImage::new(widened, src.width(), src.height()).expect("widened output is contiguous");
    derivative_3x3(&widened, [3.0, 10.0, 3.0])
}
