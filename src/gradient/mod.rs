//! Gradient modality: per-pixel magnitude and orientation.
//!
//! Gray inputs are blurred with a 5x5 Gaussian (sigma 1.5) and differentiated
//! with 3x3 Sobel. Color inputs skip the blur and use Scharr per plane; each
//! pixel keeps the orientation of the plane with the largest magnitude. The
//! magnitude map is normalized so its maximum is 1, which makes the
//! magnitude threshold scale-free.

use crate::image::filter::{gaussian_blur_5, scharr_3x3, sobel_3x3};
use crate::image::{OwnedImage, SourceImage};
use crate::util::math::wrap_deg_360;
use crate::util::ShapeMatchResult;

pub mod quantize;

const BLUR_SIGMA: f32 = 1.5;

/// Normalized gradient magnitude plus orientation in degrees [0, 360).
pub struct GradientMap {
    magnitude: OwnedImage<f32>,
    angle: OwnedImage<f32>,
}

impl GradientMap {
    /// Computes the gradient modality for a gray or planar RGB source.
    pub fn compute(src: &SourceImage) -> ShapeMatchResult<Self> {
        match src {
            SourceImage::Gray(plane) => {
                let blurred = gaussian_blur_5(plane.view(), BLUR_SIGMA);
                let (gx, gy) = sobel_3x3(&blurred);
                Ok(Self::from_derivatives(&gx, &gy))
            }
            SourceImage::Rgb(planes) => {
                let width = planes[0].width();
                let height = planes[0].height();
                let mut magnitude = vec![0.0f32; width * height];
                let mut angle = vec![0.0f32; width * height];

                for plane in planes.iter() {
                    let (gx, gy) = scharr_3x3(plane.view());
                    let gx = gx.as_slice();
                    let gy = gy.as_slice();
                    for idx in 0..width * height {
                        let mag = (gx[idx] * gx[idx] + gy[idx] * gy[idx]).sqrt();
                        if mag > magnitude[idx] {
                            magnitude[idx] = mag;
                            angle[idx] = wrap_deg_360(gy[idx].atan2(gx[idx]).to_degrees());
                        }
                    }
                }

                let magnitude = OwnedImage::new(magnitude, width, height)?;
                let angle = OwnedImage::new(angle, width, height)?;
                let mut map = Self { magnitude, angle };
                map.normalize();
                Ok(map)
            }
        }
    }

    fn from_derivatives(gx: &OwnedImage<f32>, gy: &OwnedImage<f32>) -> Self {
        let width = gx.width();
        let height = gx.height();
        let gx = gx.as_slice();
        let gy = gy.as_slice();
        let mut magnitude = Vec::with_capacity(width * height);
        let mut angle = Vec::with_capacity(width * height);
        for idx in 0..width * height {
            magnitude.push((gx[idx] * gx[idx] + gy[idx] * gy[idx]).sqrt());
            angle.push(wrap_deg_360(gy[idx].atan2(gx[idx]).to_degrees()));
        }
        let mut map = Self {
            magnitude: OwnedImage::new(magnitude, width, height)
                .expect("magnitude output is contiguous"),
            angle: OwnedImage::new(angle, width, height).expect("angle output is contiguous"),
        };
        map.normalize();
        map
    }

    /// Scales the magnitude map so the maximum is 1. A flat image stays zero.
    fn normalize(&mut self) {
        let max = self
            .magnitude
            .as_slice()
            .iter()
            .fold(0.0f32, |acc, &v| acc.max(v));
        if max > 0.0 {
            for v in self.magnitude.as_mut_slice() {
                *v /= max;
            }
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.magnitude.width()
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.magnitude.height()
    }

    /// Returns the normalized magnitude map.
    pub fn magnitude(&self) -> &OwnedImage<f32> {
        &self.magnitude
    }

    /// Returns the orientation map in degrees [0, 360).
    pub fn angle(&self) -> &OwnedImage<f32> {
        &self.angle
    }
}

#[cfg(test)]
mod tests {
    use super::GradientMap;
    use crate::image::{OwnedImage, SourceImage};

    fn vertical_edge_gray(size: usize) -> SourceImage {
        let mut data = vec![0u8; size * size];
        for y in 0..size {
            for x in size / 2..size {
                data[y * size + x] = 255;
            }
        }
        SourceImage::gray(OwnedImage::new(data, size, size).unwrap())
    }

    #[test]
    fn magnitude_is_normalized() {
        let map = GradientMap::compute(&vertical_edge_gray(32)).unwrap();
        let max = map
            .magnitude()
            .as_slice()
            .iter()
            .fold(0.0f32, |acc, &v| acc.max(v));
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn flat_image_yields_zero_magnitude() {
        let src = SourceImage::gray(OwnedImage::filled(16, 16, 128u8).unwrap());
        let map = GradientMap::compute(&src).unwrap();
        assert!(map.magnitude().as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn vertical_edge_points_horizontally() {
        let map = GradientMap::compute(&vertical_edge_gray(32)).unwrap();
        let x = 16;
        let y = 16;
        let angle = map.angle().pixel(x, y);
        // Gradient across a left-dark right-bright edge points along +x.
        assert!(angle < 10.0 || angle > 350.0, "angle was {angle}");
    }

    #[test]
    fn color_picks_strongest_plane() {
        let size = 32;
        let flat = OwnedImage::filled(size, size, 0u8).unwrap();
        let mut edged = vec![0u8; size * size];
        for y in 0..size {
            for x in size / 2..size {
                edged[y * size + x] = 255;
            }
        }
        let edged = OwnedImage::new(edged, size, size).unwrap();
        let src = SourceImage::rgb([flat.clone(), edged, flat]).unwrap();
        let map = GradientMap::compute(&src).unwrap();
        assert!(map.magnitude().pixel(size / 2, size / 2) > 0.5);
    }
}
