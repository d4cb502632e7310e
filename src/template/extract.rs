//! Feature extraction: edge thinning, local suppression and scatter selection.
//!
//! Extraction runs on the gradient maps of one warped template level. Strong
//! gradients are thinned along their own direction, suppressed inside a local
//! window, and finally scattered so the kept features cover the shape instead
//! of crowding its strongest edge.

use crate::gradient::quantize::LABEL_NONE;
use crate::gradient::GradientMap;
use crate::image::OwnedImage;
use crate::template::{Feature, RotatedBox, ShapeTemplate, TemplateParams};
use crate::util::{ShapeMatchError, ShapeMatchResult};

/// Lowest scatter distance the selection loop will try.
const SCATTER_FLOOR: f32 = 2.0;

/// Scatter adjustment attempts before giving up.
const MAX_SCATTER_TURNS: usize = 100;

#[derive(Copy, Clone)]
struct CandidateFeature {
    x: usize,
    y: usize,
    label: u8,
    magnitude: f32,
}

/// Extracts a scattered feature template from one pyramid level.
///
/// `labels` is the Step-A label map of the same gradient maps; the mask has
/// already been folded into it. `content_box` is the rotated bounding box of
/// the template content in the same (level) pixel frame as the gradient
/// maps; it is rebased alongside the features. Produces exactly
/// `params.num_features` features or fails with `InsufficientFeatures`.
pub fn extract_template(
    grad: &GradientMap,
    labels: &OwnedImage<u8>,
    params: &TemplateParams,
    pyramid_level: usize,
    scale: f32,
    content_box: RotatedBox,
) -> ShapeMatchResult<ShapeTemplate> {
    params.validate()?;

    let thinned = direction_nms(grad);
    let suppressed = kernel_nms(&thinned, params.magnitude_threshold, params.nms_kernel_size);
    let candidates = collect_candidates(&suppressed, labels, params.magnitude_threshold);
    let picked = scatter_select(&candidates, params)?;

    // Rebase to the feature extent so match positions are box anchored.
    let min_x = picked.iter().map(|c| c.x).min().expect("picked is non-empty");
    let min_y = picked.iter().map(|c| c.y).min().expect("picked is non-empty");
    let max_x = picked.iter().map(|c| c.x).max().expect("picked is non-empty");
    let max_y = picked.iter().map(|c| c.y).max().expect("picked is non-empty");

    let features = picked
        .iter()
        .map(|c| Feature {
            x: c.x - min_x,
            y: c.y - min_y,
            label: c.label,
        })
        .collect();

    Ok(ShapeTemplate {
        features,
        box_width: max_x - min_x + 1,
        box_height: max_y - min_y + 1,
        rotated_box: content_box.translated(-(min_x as f32), -(min_y as f32)),
        pyramid_level,
        angle: content_box.angle,
        scale,
    })
}

/// Thins edges by suppressing pixels that are not maximal along their own
/// gradient direction, quantized to {0, 45, 90, 135} degrees.
fn direction_nms(grad: &GradientMap) -> OwnedImage<f32> {
    let width = grad.width();
    let height = grad.height();
    let magnitude = grad.magnitude();
    let angle = grad.angle();
    let mut out = magnitude.clone();

    let sample = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
            0.0
        } else {
            magnitude.pixel(x as usize, y as usize)
        }
    };

    for y in 0..height {
        for x in 0..width {
            // Axis index: 0 -> horizontal, 1 -> diagonal, 2 -> vertical,
            // 3 -> anti-diagonal; folded over opposite directions.
            let axis = (((angle.pixel(x, y) + 22.5) / 45.0) as usize) % 4;
            let (dx, dy) = match axis {
                0 => (1isize, 0isize),
                1 => (1, 1),
                2 => (0, 1),
                _ => (1, -1),
            };
            let here = magnitude.pixel(x, y);
            let prev = sample(x as isize - dx, y as isize - dy);
            let next = sample(x as isize + dx, y as isize + dy);
            if here < prev || here < next {
                out.set_pixel(x, y, 0.0);
            }
        }
    }

    out
}

/// Keeps only pixels that no neighbor inside their `kernel_size` box beats.
///
/// Exact ties survive on both sides; synthetic straight edges produce long
/// runs of equal magnitude and the scatter stage spaces those out anyway.
fn kernel_nms(magnitude: &OwnedImage<f32>, threshold: f32, kernel_size: usize) -> OwnedImage<f32> {
    let width = magnitude.width();
    let height = magnitude.height();
    let half = (kernel_size / 2) as isize;
    let mut out = magnitude.clone();

    for y in 0..height {
        for x in 0..width {
            let here = magnitude.pixel(x, y);
            if here < threshold {
                continue;
            }
            let mut keep = true;
            'window: for dy in -half..=half {
                let sy = y as isize + dy;
                if sy < 0 || sy >= height as isize {
                    continue;
                }
                for dx in -half..=half {
                    let sx = x as isize + dx;
                    if sx < 0 || sx >= width as isize {
                        continue;
                    }
                    if magnitude.pixel(sx as usize, sy as usize) > here {
                        keep = false;
                        break 'window;
                    }
                }
            }
            if !keep {
                out.set_pixel(x, y, 0.0);
            }
        }
    }

    out
}

/// Collects surviving pixels that still carry a quantized label.
fn collect_candidates(
    magnitude: &OwnedImage<f32>,
    labels: &OwnedImage<u8>,
    threshold: f32,
) -> Vec<CandidateFeature> {
    let mut candidates = Vec::new();
    for y in 0..magnitude.height() {
        for x in 0..magnitude.width() {
            let mag = magnitude.pixel(x, y);
            if mag < threshold {
                continue;
            }
            let label = labels.pixel(x, y);
            if label == LABEL_NONE {
                continue;
            }
            candidates.push(CandidateFeature {
                x,
                y,
                label,
                magnitude: mag,
            });
        }
    }
    candidates
}

/// Greedily keeps candidates whose distance to every kept one exceeds `dist`.
///
/// Candidates must already be sorted by descending magnitude.
fn greedy_pick(candidates: &[CandidateFeature], dist: f32) -> Vec<CandidateFeature> {
    let dist_sq = dist * dist;
    let mut kept: Vec<CandidateFeature> = Vec::new();
    'outer: for cand in candidates {
        for prev in &kept {
            let dx = cand.x as f32 - prev.x as f32;
            let dy = cand.y as f32 - prev.y as f32;
            if dx * dx + dy * dy <= dist_sq {
                continue 'outer;
            }
        }
        kept.push(*cand);
    }
    kept
}

/// Iterative-distance scatter: adjusts the spacing until exactly
/// `num_features` features are kept.
fn scatter_select(
    candidates: &[CandidateFeature],
    params: &TemplateParams,
) -> ShapeMatchResult<Vec<CandidateFeature>> {
    let wanted = params.num_features;
    if candidates.len() < wanted {
        return Err(ShapeMatchError::InsufficientFeatures {
            wanted,
            got: candidates.len(),
        });
    }

    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| b.magnitude.partial_cmp(&a.magnitude).expect("magnitudes are finite"));

    let mut dist = (params.nms_kernel_size as f32 * sorted.len() as f32 / wanted as f32)
        .max(params.scatter_distance)
        .max(SCATTER_FLOOR);
    let mut picked = greedy_pick(&sorted, dist);

    for _ in 0..MAX_SCATTER_TURNS {
        if picked.len() == wanted {
            return Ok(picked);
        }
        if picked.len() > wanted {
            // Over-full: try spreading further; settle for the strongest
            // subset once a wider spacing would drop below the target.
            let wider = greedy_pick(&sorted, dist + 1.0);
            if wider.len() >= wanted {
                dist += 1.0;
                picked = wider;
            } else {
                picked.truncate(wanted);
                return Ok(picked);
            }
        } else {
            if dist <= SCATTER_FLOOR {
                return Err(ShapeMatchError::InsufficientFeatures {
                    wanted,
                    got: picked.len(),
                });
            }
            dist = (dist - 1.0).max(SCATTER_FLOOR);
            picked = greedy_pick(&sorted, dist);
        }
    }

    if picked.len() >= wanted {
        picked.truncate(wanted);
        return Ok(picked);
    }
    Err(ShapeMatchError::InsufficientFeatures {
        wanted,
        got: picked.len(),
    })
}
