//! Shape-info producer: enumerates (angle, scale) template variants.
//!
//! The producer owns a padded copy of the template image and mask. Padding is
//! sized from the template diagonal so no rotation or scale inside the
//! configured ranges can clip content: each side grows by
//! `1 + ceil(sqrt(rows^2 + cols^2)) - dim/2`. The image border replicates
//! edge pixels, the mask border is zero (excluded).

use crate::image::warp::{pad, warp_bilinear, warp_nearest, BorderMode};
use crate::image::{OwnedImage, SourceImage};
use crate::util::{ShapeMatchError, ShapeMatchResult};

/// Numerical slack for range enumeration.
pub const DEFAULT_EPS: f32 = 1e-7;

/// One emitted template variant: rotation angle in degrees plus uniform scale.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeInfo {
    /// Rotation angle in degrees.
    pub angle: f32,
    /// Uniform scale factor.
    pub scale: f32,
}

/// Serializable snapshot of the producer parameters and emitted infos.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProducerConfig {
    /// Inclusive angle range in degrees.
    pub angle_range: [f32; 2],
    /// Inclusive scale range.
    pub scale_range: [f32; 2],
    /// Angle step in degrees.
    pub angle_step: f32,
    /// Scale step.
    pub scale_step: f32,
    /// Numerical slack applied to both range upper bounds.
    pub eps: f32,
    /// Produced (angle, scale) entries.
    pub infos: Vec<ShapeInfo>,
}

/// Enumerates rotated/scaled template variants over configured ranges.
pub struct ShapeInfoProducer {
    /// Inclusive angle range in degrees.
    pub angle_range: [f32; 2],
    /// Inclusive scale range.
    pub scale_range: [f32; 2],
    /// Angle step in degrees.
    pub angle_step: f32,
    /// Scale step.
    pub scale_step: f32,
    /// Numerical slack applied to both range upper bounds.
    pub eps: f32,
    src: SourceImage,
    mask: OwnedImage<u8>,
    orig_width: usize,
    orig_height: usize,
    infos: Vec<ShapeInfo>,
}

impl ShapeInfoProducer {
    /// Creates a producer around a template image and optional mask.
    ///
    /// With `padded == false` the template and mask are grown by the
    /// rotation-safe border described in the module docs; pass `true` when
    /// the caller already padded both.
    pub fn new(
        src: SourceImage,
        mask: Option<OwnedImage<u8>>,
        padded: bool,
    ) -> ShapeMatchResult<Self> {
        let rows = src.height();
        let cols = src.width();
        if let Some(mask) = &mask {
            if mask.width() != cols || mask.height() != rows {
                return Err(ShapeMatchError::MaskMismatch {
                    img_width: cols,
                    img_height: rows,
                    mask_width: mask.width(),
                    mask_height: mask.height(),
                });
            }
        }

        let (src, mask) = if padded {
            let mask = match mask {
                Some(mask) => mask,
                None => OwnedImage::filled(cols, rows, 255)?,
            };
            (src, mask)
        } else {
            let border = 1 + ((rows * rows + cols * cols) as f64).sqrt().ceil() as usize;
            let (top, bottom) = (border - rows / 2, border - rows / 2);
            let (left, right) = (border - cols / 2, border - cols / 2);
            let padded_src =
                src.map_planes(|plane| Ok(pad(plane, top, bottom, left, right, BorderMode::Replicate)))?;
            let padded_mask = match mask {
                Some(mask) => pad(&mask, top, bottom, left, right, BorderMode::Constant(0)),
                None => OwnedImage::filled(cols + left + right, rows + top + bottom, 255)?,
            };
            (padded_src, padded_mask)
        };

        Ok(Self {
            angle_range: [0.0, 0.0],
            scale_range: [1.0, 1.0],
            angle_step: 0.0,
            scale_step: 0.0,
            eps: DEFAULT_EPS,
            orig_width: cols,
            orig_height: rows,
            src,
            mask,
            infos: Vec::new(),
        })
    }

    /// Creates a producer that emits only the identity variant (0 deg, 1.0x).
    pub fn identity(src: SourceImage, mask: Option<OwnedImage<u8>>) -> ShapeMatchResult<Self> {
        let mut producer = Self::new(src, mask, false)?;
        producer.produce_infos()?;
        Ok(producer)
    }

    /// Enumerates all (angle, scale) pairs for the current ranges.
    ///
    /// The outer loop walks scales, the inner loop angles; both bounds are
    /// inclusive within `eps` and step sizes are floored at `2 * eps`.
    pub fn produce_infos(&mut self) -> ShapeMatchResult<()> {
        if self.scale_range[0] > self.scale_range[1] + self.eps {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "scale_range lower bound exceeds upper bound",
            });
        }
        if self.angle_range[0] > self.angle_range[1] + self.eps {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "angle_range lower bound exceeds upper bound",
            });
        }

        let scale_step = self.scale_step.max(2.0 * self.eps);
        let angle_step = self.angle_step.max(2.0 * self.eps);

        self.infos.clear();
        let mut scale = self.scale_range[0];
        while scale <= self.scale_range[1] + self.eps {
            let mut angle = self.angle_range[0];
            while angle <= self.angle_range[1] + self.eps {
                self.infos.push(ShapeInfo { angle, scale });
                angle += angle_step;
            }
            scale += scale_step;
        }
        Ok(())
    }

    /// Returns the produced (angle, scale) list.
    pub fn infos(&self) -> &[ShapeInfo] {
        &self.infos
    }

    /// Returns the padded template warped to the given variant.
    pub fn src_of(&self, info: ShapeInfo) -> ShapeMatchResult<SourceImage> {
        self.src
            .map_planes(|plane| Ok(warp_bilinear(plane, info.angle, info.scale, 0)))
    }

    /// Returns the padded mask warped to the given variant.
    pub fn mask_of(&self, info: ShapeInfo) -> OwnedImage<u8> {
        warp_nearest(&self.mask, info.angle, info.scale)
    }

    /// Returns the unpadded template dimensions `(width, height)`.
    pub fn template_size(&self) -> (usize, usize) {
        (self.orig_width, self.orig_height)
    }

    /// Snapshots the range parameters and produced infos.
    pub fn config(&self) -> ProducerConfig {
        ProducerConfig {
            angle_range: self.angle_range,
            scale_range: self.scale_range,
            angle_step: self.angle_step,
            scale_step: self.scale_step,
            eps: self.eps,
            infos: self.infos.clone(),
        }
    }

    /// Restores range parameters and produced infos from a snapshot.
    pub fn set_config(&mut self, config: ProducerConfig) {
        self.angle_range = config.angle_range;
        self.scale_range = config.scale_range;
        self.angle_step = config.angle_step;
        self.scale_step = config.scale_step;
        self.eps = config.eps;
        self.infos = config.infos;
    }
}
