//! Shape templates: scattered orientation features plus pose metadata.

use crate::util::math::sin_cos_deg;
use crate::util::{ShapeMatchError, ShapeMatchResult};

pub mod extract;

/// One template feature: a location plus its quantized orientation label.
///
/// Coordinates are relative to the template's bounding box top-left corner.
/// The feature order is fixed at extraction time and shared by the
/// similarity engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Feature {
    /// Column offset inside the bounding box.
    pub x: usize,
    /// Row offset inside the bounding box.
    pub y: usize,
    /// Quantized orientation label in [0, 16).
    pub label: u8,
}

/// Parameters controlling template extraction.
#[derive(Copy, Clone, Debug)]
pub struct TemplateParams {
    /// Maximum features kept per template level.
    pub num_features: usize,
    /// Normalized magnitude floor for valid gradients.
    pub magnitude_threshold: f32,
    /// Window size for kernel-local non-maximum suppression (odd).
    pub nms_kernel_size: usize,
    /// Minimum feature spacing floor in pixels.
    pub scatter_distance: f32,
}

impl Default for TemplateParams {
    fn default() -> Self {
        Self {
            num_features: 128,
            magnitude_threshold: 0.2,
            nms_kernel_size: 5,
            scatter_distance: 10.0,
        }
    }
}

impl TemplateParams {
    /// Validates the extraction parameters.
    pub fn validate(&self) -> ShapeMatchResult<()> {
        if self.num_features == 0 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "num_features must be at least 1",
            });
        }
        if !self.magnitude_threshold.is_finite() || self.magnitude_threshold < 0.0 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "magnitude_threshold must be a non-negative finite value",
            });
        }
        if self.nms_kernel_size % 2 == 0 || self.nms_kernel_size == 0 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "nms_kernel_size must be odd",
            });
        }
        if !self.scatter_distance.is_finite() || self.scatter_distance < 2.0 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "scatter_distance must be at least 2",
            });
        }
        Ok(())
    }
}

/// Oriented bounding box of the template content.
///
/// Lives in the same local frame as the features: the origin is the
/// feature-extent anchor's top-left, so translating by a match anchor places
/// the box in search-image coordinates. Width and height carry the variant
/// scale; the angle is the variant rotation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotatedBox {
    /// Box center x.
    pub center_x: f32,
    /// Box center y.
    pub center_y: f32,
    /// Full extent along the box's own x axis.
    pub width: f32,
    /// Full extent along the box's own y axis.
    pub height: f32,
    /// Rotation angle in degrees.
    pub angle: f32,
}

impl RotatedBox {
    /// Shifts the box by `(dx, dy)`.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            center_x: self.center_x + dx,
            center_y: self.center_y + dy,
            ..*self
        }
    }

    /// Returns true when `(x, y)` lies inside the box.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (sin, cos) = sin_cos_deg(self.angle);
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        // Undo the content rotation, then test the axis-aligned extent.
        let lx = cos * dx - sin * dy;
        let ly = sin * dx + cos * dy;
        lx.abs() <= self.width / 2.0 && ly.abs() <= self.height / 2.0
    }

    /// Returns the four corner points, top-left first in content order.
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (sin, cos) = sin_cos_deg(self.angle);
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(qx, qy)| {
            (
                self.center_x + cos * qx + sin * qy,
                self.center_y - sin * qx + cos * qy,
            )
        })
    }

    /// Returns the box diagonal in pixels.
    pub fn diagonal(&self) -> f32 {
        (self.width * self.width + self.height * self.height).sqrt()
    }
}

/// A shape template for one (pyramid level, angle, scale) variant.
#[derive(Clone, Debug)]
pub struct ShapeTemplate {
    /// Scattered features in extraction order, anchor-box relative.
    pub features: Vec<Feature>,
    /// Width of the feature-extent anchor box.
    pub box_width: usize,
    /// Height of the feature-extent anchor box.
    pub box_height: usize,
    /// Rotated bounding box of the template content, feature-frame local.
    pub rotated_box: RotatedBox,
    /// Pyramid level this template was extracted at (0 = finest).
    pub pyramid_level: usize,
    /// Rotation angle of the variant in degrees.
    pub angle: f32,
    /// Uniform scale of the variant.
    pub scale: f32,
}

#[cfg(test)]
mod tests {
    use super::RotatedBox;

    #[test]
    fn unrotated_corners_span_the_extent() {
        let rect = RotatedBox {
            center_x: 10.0,
            center_y: 20.0,
            width: 8.0,
            height: 4.0,
            angle: 0.0,
        };
        let corners = rect.corners();
        assert_eq!(corners[0], (6.0, 18.0));
        assert_eq!(corners[2], (14.0, 22.0));
        assert!((rect.diagonal() - 80.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn containment_follows_the_rotation() {
        let rect = RotatedBox {
            center_x: 0.0,
            center_y: 0.0,
            width: 20.0,
            height: 4.0,
            angle: 90.0,
        };
        // The long axis now runs vertically.
        assert!(rect.contains(0.0, 9.0));
        assert!(!rect.contains(9.0, 0.0));
        assert!(rect.contains(1.5, 0.0));
    }

    #[test]
    fn translation_moves_only_the_center() {
        let rect = RotatedBox {
            center_x: 1.0,
            center_y: 2.0,
            width: 6.0,
            height: 6.0,
            angle: 30.0,
        };
        let moved = rect.translated(4.0, -1.0);
        assert_eq!(moved.center_x, 5.0);
        assert_eq!(moved.center_y, 1.0);
        assert_eq!(moved.width, rect.width);
        assert_eq!(moved.angle, rect.angle);
    }
}
