//! Similarity evaluation against linear memories.
//!
//! The full-map path accumulates one contiguous slice per feature into a
//! tile-resolution buffer; entry `(i, j)` scores the template with its
//! bounding box anchored at pixel `(j*T, i*T)`. The ROI path re-evaluates
//! arbitrary pixel anchors through `linear_at`, which is what the
//! coarse-to-fine refinement uses to recover pixel-accurate positions.

use crate::response::linear::LinearMemory;
use crate::response::MAX_RESPONSE;
use crate::template::ShapeTemplate;

/// Linear memories plus geometry for one pyramid level of a bound source.
#[derive(Debug)]
pub(crate) struct LevelMemories {
    /// One linear memory per reference orientation.
    pub(crate) memories: Vec<LinearMemory>,
    /// Level width before tile padding.
    pub(crate) width: usize,
    /// Level height before tile padding.
    pub(crate) height: usize,
    /// Tile size shared by spread and linearization.
    pub(crate) tile: usize,
}

impl LevelMemories {
    /// Returns true when the template box fits with its top-left at `(x, y)`.
    pub(crate) fn fits(&self, templ: &ShapeTemplate, x: usize, y: usize) -> bool {
        x + templ.box_width <= self.width && y + templ.box_height <= self.height
    }
}

/// Inclusive pixel rectangle used to restrict refinement.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Roi {
    pub(crate) x0: usize,
    pub(crate) y0: usize,
    pub(crate) x1: usize,
    pub(crate) y1: usize,
}

impl Roi {
    /// Builds an ROI of `radius` around `(x, y)`, clamped to valid template
    /// anchors for the given level. Returns None when the template cannot be
    /// placed anywhere near the point.
    pub(crate) fn around(
        mems: &LevelMemories,
        templ: &ShapeTemplate,
        x: usize,
        y: usize,
        radius: usize,
    ) -> Option<Self> {
        if templ.box_width > mems.width || templ.box_height > mems.height {
            return None;
        }
        let max_x = mems.width - templ.box_width;
        let max_y = mems.height - templ.box_height;
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        if x0 > max_x || y0 > max_y {
            return None;
        }
        Some(Self {
            x0,
            y0,
            x1: (x + radius).min(max_x),
            y1: (y + radius).min(max_y),
        })
    }
}

/// Converts a raw response sum to a percent similarity.
pub(crate) fn score_percent(sum: u32, num_features: usize) -> f32 {
    100.0 * sum as f32 / (MAX_RESPONSE as u32 * num_features as u32) as f32
}

/// Computes the tile-resolution similarity map for one template.
///
/// The returned buffer has the linear memories' outer layout
/// (`outer_rows x outer_cols`).
pub(crate) fn similarity_map(mems: &LevelMemories, templ: &ShapeTemplate) -> Vec<u16> {
    let cols = mems.memories[0].outer_cols();
    let rows = mems.memories[0].outer_rows();
    let tile = mems.tile;
    let mut sim = vec![0u16; rows * cols];

    for feature in &templ.features {
        let memory = &mems.memories[feature.label as usize];
        let base = (feature.y / tile) * cols + feature.x / tile;
        if base >= sim.len() {
            continue;
        }
        let buffer = memory.buffer(feature.y % tile, feature.x % tile);
        for (dst, &value) in sim.iter_mut().zip(&buffer[base..]) {
            *dst += u16::from(value);
        }
    }

    sim
}

/// Raw response sum for the template anchored at pixel `(x, y)`.
///
/// Returns None when the template box does not fit there.
pub(crate) fn similarity_at(
    mems: &LevelMemories,
    templ: &ShapeTemplate,
    x: usize,
    y: usize,
) -> Option<u32> {
    if !mems.fits(templ, x, y) {
        return None;
    }
    let mut sum = 0u32;
    for feature in &templ.features {
        let memory = &mems.memories[feature.label as usize];
        sum += u32::from(memory.linear_at(y + feature.y, x + feature.x));
    }
    Some(sum)
}

/// Best anchor inside an ROI as `(x, y, raw sum)`.
///
/// Spreading produces plateaus of equal score around the true position, so
/// the reported anchor is the centroid of all positions achieving the
/// maximum rather than the first one found.
pub(crate) fn best_in_roi(
    mems: &LevelMemories,
    templ: &ShapeTemplate,
    roi: Roi,
) -> Option<(usize, usize, u32)> {
    let mut best: Option<u32> = None;
    let mut sum_x = 0usize;
    let mut sum_y = 0usize;
    let mut count = 0usize;

    for y in roi.y0..=roi.y1 {
        for x in roi.x0..=roi.x1 {
            let Some(sum) = similarity_at(mems, templ, x, y) else {
                continue;
            };
            match best {
                Some(current) if sum < current => {}
                Some(current) if sum == current => {
                    sum_x += x;
                    sum_y += y;
                    count += 1;
                }
                _ => {
                    best = Some(sum);
                    sum_x = x;
                    sum_y = y;
                    count = 1;
                }
            }
        }
    }

    best.map(|sum| {
        let x = (sum_x as f32 / count as f32).round() as usize;
        let y = (sum_y as f32 / count as f32).round() as usize;
        (x, y, sum)
    })
}

#[cfg(test)]
mod tests {
    use super::{best_in_roi, score_percent, similarity_at, similarity_map, LevelMemories, Roi};
    use crate::image::OwnedImage;
    use crate::response::linear::LinearMemory;
    use crate::response::NUM_ORIENTATIONS;
    use crate::template::{Feature, RotatedBox, ShapeTemplate};

    fn axis_box(width: f32, height: f32) -> RotatedBox {
        RotatedBox {
            center_x: width / 2.0,
            center_y: height / 2.0,
            width,
            height,
            angle: 0.0,
        }
    }

    /// Level memories where orientation `k`'s map is constant `k % 5`.
    fn constant_memories(width: usize, height: usize, tile: usize) -> LevelMemories {
        let memories = (0..NUM_ORIENTATIONS)
            .map(|k| {
                let map = OwnedImage::filled(width, height, (k % 5) as u8).unwrap();
                LinearMemory::linearize(&map, tile).unwrap()
            })
            .collect();
        LevelMemories {
            memories,
            width,
            height,
            tile,
        }
    }

    fn two_feature_template() -> ShapeTemplate {
        ShapeTemplate {
            features: vec![
                Feature { x: 0, y: 0, label: 4 },
                Feature { x: 3, y: 1, label: 2 },
            ],
            box_width: 4,
            box_height: 2,
            rotated_box: axis_box(4.0, 2.0),
            pyramid_level: 0,
            angle: 0.0,
            scale: 1.0,
        }
    }

    #[test]
    fn full_map_matches_pixel_path_on_tile_anchors() {
        let mems = constant_memories(32, 24, 4);
        let templ = two_feature_template();
        let sim = similarity_map(&mems, &templ);
        let cols = mems.memories[0].outer_cols();
        for i in 0..mems.memories[0].outer_rows() {
            for j in 0..cols {
                let (x, y) = (j * 4, i * 4);
                if let Some(sum) = similarity_at(&mems, &templ, x, y) {
                    assert_eq!(u32::from(sim[i * cols + j]), sum);
                }
            }
        }
    }

    #[test]
    fn constant_maps_score_everywhere_equal() {
        let mems = constant_memories(32, 24, 4);
        let templ = two_feature_template();
        // label 4 -> 4, label 2 -> 2: sum 6 at every valid anchor.
        assert_eq!(similarity_at(&mems, &templ, 5, 7), Some(6));
        assert_eq!(similarity_at(&mems, &templ, 0, 0), Some(6));
        assert!(similarity_at(&mems, &templ, 31, 0).is_none());
    }

    #[test]
    fn roi_centroid_lands_on_plateau_center() {
        // One-feature template over a map with a 3-wide max plateau.
        let mut map = OwnedImage::filled(16, 16, 0u8).unwrap();
        for x in 5..8 {
            map.set_pixel(x, 6, 4);
        }
        let mut memories = Vec::new();
        for _ in 0..NUM_ORIENTATIONS {
            memories.push(LinearMemory::linearize(&map, 4).unwrap());
        }
        let mems = LevelMemories {
            memories,
            width: 16,
            height: 16,
            tile: 4,
        };
        let templ = ShapeTemplate {
            features: vec![Feature { x: 0, y: 0, label: 0 }],
            box_width: 1,
            box_height: 1,
            rotated_box: axis_box(1.0, 1.0),
            pyramid_level: 0,
            angle: 0.0,
            scale: 1.0,
        };
        let roi = Roi::around(&mems, &templ, 6, 6, 5).unwrap();
        let (x, y, sum) = best_in_roi(&mems, &templ, roi).unwrap();
        assert_eq!((x, y), (6, 6));
        assert_eq!(sum, 4);
    }

    #[test]
    fn score_percent_reaches_one_hundred() {
        assert!((score_percent(4 * 128, 128) - 100.0).abs() < 1e-4);
        assert!((score_percent(0, 128)).abs() < 1e-6);
    }
}
