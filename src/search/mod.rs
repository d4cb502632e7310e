//! Detector: source binding, template registration and coarse-to-fine match.
//!
//! The detector owns three registries keyed by class id: memory pyramids
//! (linear memories per level), template pyramids (one shape template per
//! pyramid level and (angle, scale) variant) and match lists. Entries are
//! plain owned values with no back-references, so ids can be inserted and
//! evicted independently.
//!
//! Matching is coarse-to-fine: the full tile-resolution similarity map at
//! the coarsest level seeds candidates, each candidate is re-scored at pixel
//! resolution inside a small ROI, and surviving candidates are projected
//! down one level at a time until level 0. Every template variant is
//! independent during a match, which is what the optional `rayon` path
//! exploits; linear memories are only read.

use crate::gradient::quantize::{dominant_bitmask, label_map};
use crate::gradient::GradientMap;
use crate::image::pyramid::{build_mask_pyramid, ImagePyramid};
use crate::image::{OwnedImage, SourceImage};
use crate::response::linear::LinearMemory;
use crate::response::{response_maps, spread, SimilarityLut};
use crate::shapeinfo::ShapeInfoProducer;
use crate::template::extract::extract_template;
use crate::template::{RotatedBox, ShapeTemplate, TemplateParams};
use crate::trace::{trace_span, trace_warn};
use crate::util::{ShapeMatchError, ShapeMatchResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

mod nms;
pub(crate) mod similarity;

use nms::{suppress_matches, MatchMeta};
use similarity::{best_in_roi, score_percent, similarity_map, LevelMemories, Roi};

/// Features kept at the coarsest levels never drop below this count.
const MIN_LEVEL_FEATURES: usize = 8;

/// Class id used by the one-shot [`Detector::match_templates`] entry point.
pub const DEFAULT_CLASS: &str = "default";

/// Matcher configuration shared by source binding, template extraction and
/// the match pipeline.
#[derive(Clone, Debug)]
pub struct MatchParams {
    /// Maximum features per template at level 0; coarser levels keep
    /// proportionally fewer.
    pub num_features: usize,
    /// Normalized magnitude floor for valid gradients.
    pub magnitude_threshold: f32,
    /// Window for kernel-local feature suppression (odd).
    pub nms_kernel_size: usize,
    /// Minimum feature spacing floor in pixels.
    pub scatter_distance: f32,
    /// Window for the dominant-orientation vote (odd).
    pub count_kernel_size: usize,
    /// Votes required to set an orientation bit.
    pub count_threshold: u32,
    /// Tile size: spread window and linear-memory stride (power of two <= 8).
    pub spread_tile: usize,
    /// Pyramid levels used for sources and templates.
    pub pyramid_levels: usize,
    /// Match suppression radius; defaults to template diagonal / 8.
    pub nms_radius: Option<f32>,
    /// Match suppression angle tolerance; defaults to the producer's step.
    pub nms_angle_tol: Option<f32>,
    /// Match suppression scale tolerance; defaults to the producer's step.
    pub nms_scale_tol: Option<f32>,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            num_features: 128,
            magnitude_threshold: 0.2,
            nms_kernel_size: 5,
            scatter_distance: 10.0,
            count_kernel_size: 5,
            count_threshold: 5,
            spread_tile: 8,
            pyramid_levels: 2,
            nms_radius: None,
            nms_angle_tol: None,
            nms_scale_tol: None,
        }
    }
}

impl MatchParams {
    /// Validates the configuration, returning an error if any parameter is
    /// invalid.
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
        if self.count_kernel_size % 2 == 0 || self.count_kernel_size == 0 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "count_kernel_size must be odd",
            });
        }
        if self.count_threshold == 0 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "count_threshold must be at least 1",
            });
        }
        // The spread window and the linear-memory stride are one knob: the
        // scoring offsets are only valid when they agree.
        if !self.spread_tile.is_power_of_two() || self.spread_tile > 8 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "spread_tile must be a power of two no larger than 8",
            });
        }
        if self.pyramid_levels == 0 {
            return Err(ShapeMatchError::InvalidInput {
                reason: "pyramid_levels must be at least 1",
            });
        }
        if !self.scatter_distance.is_finite() || self.scatter_distance < 2.0 {
            return Err(ShapeMatchError::InvalidConfig {
                reason: "scatter_distance must be at least 2",
            });
        }
        Ok(())
    }

    /// Extraction parameters for one pyramid level.
    fn template_params(&self, level: usize) -> TemplateParams {
        TemplateParams {
            num_features: (self.num_features >> level).max(MIN_LEVEL_FEATURES),
            magnitude_threshold: self.magnitude_threshold,
            nms_kernel_size: self.nms_kernel_size,
            scatter_distance: self.scatter_distance,
        }
    }
}

/// Cooperative cancellation flag checked between levels and templates.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the running match.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

fn check_cancel(cancel: Option<&CancelToken>) -> ShapeMatchResult<()> {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(ShapeMatchError::Cancelled);
    }
    Ok(())
}

/// One match hit: bounding-box anchor, template variant and percent score.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MatchPoint {
    /// Box top-left x at level 0.
    pub x: usize,
    /// Box top-left y at level 0.
    pub y: usize,
    /// Index into the class's template variants.
    pub template_id: usize,
    /// Similarity in percent [0, 100].
    pub similarity: f32,
}

/// Center-based match summary with the variant pose resolved.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BestMatch {
    /// Match center x at level 0.
    pub x: f32,
    /// Match center y at level 0.
    pub y: f32,
    /// Variant scale.
    pub scale: f32,
    /// Variant rotation angle in degrees.
    pub angle: f32,
    /// Similarity in percent [0, 100].
    pub similarity: f32,
    /// Rotated bounding box of the matched content in search coordinates.
    pub bounds: RotatedBox,
}

/// One (angle, scale) template variant across all pyramid levels.
#[derive(Debug)]
pub struct TemplateVariant {
    /// Rotation angle in degrees.
    pub angle: f32,
    /// Uniform scale.
    pub scale: f32,
    /// One template per pyramid level; empty when not created.
    pub levels: Vec<ShapeTemplate>,
    /// False when feature extraction failed for some level.
    pub created: bool,
}

#[derive(Debug)]
struct TemplateClass {
    variants: Vec<TemplateVariant>,
    angle_step: f32,
    scale_step: f32,
}

#[derive(Debug)]
struct SourceMemories {
    levels: Vec<LevelMemories>,
    labels: Vec<OwnedImage<u8>>,
}

/// Shape-based template matching detector.
#[derive(Debug)]
pub struct Detector {
    params: MatchParams,
    lut: SimilarityLut,
    sources: HashMap<String, SourceMemories>,
    templates: HashMap<String, TemplateClass>,
    matches: HashMap<String, Vec<MatchPoint>>,
}

impl Detector {
    /// Creates a detector, precomputing the orientation response table.
    pub fn new(params: MatchParams) -> ShapeMatchResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            lut: SimilarityLut::new(),
            sources: HashMap::new(),
            templates: HashMap::new(),
            matches: HashMap::new(),
        })
    }

    /// Returns the detector configuration.
    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    /// Binds a search image: builds its pyramid, response maps and linear
    /// memories, stored under `memory_id`.
    pub fn add_source(
        &mut self,
        src: &SourceImage,
        mask: Option<&OwnedImage<u8>>,
        memory_id: &str,
    ) -> ShapeMatchResult<()> {
        let _span = trace_span!("add_source", id = memory_id).entered();

        if let Some(mask) = mask {
            if mask.width() != src.width() || mask.height() != src.height() {
                return Err(ShapeMatchError::MaskMismatch {
                    img_width: src.width(),
                    img_height: src.height(),
                    mask_width: mask.width(),
                    mask_height: mask.height(),
                });
            }
        }

        let levels = self.params.pyramid_levels;
        let pyramid = ImagePyramid::build(src, levels)?;
        let mask_pyramid = match mask {
            Some(mask) => Some(build_mask_pyramid(mask, levels)?),
            None => None,
        };

        let mut level_memories = Vec::with_capacity(levels);
        let mut level_labels = Vec::with_capacity(levels);
        for level in 0..levels {
            let image = pyramid.level(level);
            let grad = GradientMap::compute(image)?;
            let labels = label_map(
                &grad,
                self.params.magnitude_threshold,
                mask_pyramid.as_ref().map(|pyr| &pyr[level]),
            )?;
            let bits = dominant_bitmask(
                &labels,
                self.params.count_kernel_size,
                self.params.count_threshold,
            )?;
            let spread_bits = spread(&bits, self.params.spread_tile)?;
            let maps = response_maps(&spread_bits, &self.lut);
            let memories = maps
                .iter()
                .map(|map| LinearMemory::linearize(map, self.params.spread_tile))
                .collect::<ShapeMatchResult<Vec<_>>>()?;

            level_memories.push(LevelMemories {
                memories,
                width: image.width(),
                height: image.height(),
                tile: self.params.spread_tile,
            });
            level_labels.push(labels);
        }

        self.sources.insert(
            memory_id.to_owned(),
            SourceMemories {
                levels: level_memories,
                labels: level_labels,
            },
        );
        Ok(())
    }

    /// Registers a template class: one template pyramid per (angle, scale)
    /// emitted by the producer, stored under `template_id`.
    ///
    /// Variants whose feature extraction fails are marked not-created and
    /// skipped during matching; a warning is emitted for each.
    pub fn add_template(
        &mut self,
        producer: &ShapeInfoProducer,
        template_id: &str,
    ) -> ShapeMatchResult<()> {
        let _span = trace_span!("add_template", id = template_id).entered();

        if producer.infos().is_empty() {
            return Err(ShapeMatchError::ShapeInfoExhausted);
        }

        let levels = self.params.pyramid_levels;
        let (content_width, content_height) = producer.template_size();
        let mut variants = Vec::with_capacity(producer.infos().len());
        for &info in producer.infos() {
            let warped = producer.src_of(info)?;
            let warped_mask = producer.mask_of(info);
            let pyramid = ImagePyramid::build(&warped, levels)?;
            let mask_pyramid = build_mask_pyramid(&warped_mask, levels)?;

            let mut level_templates = Vec::with_capacity(levels);
            let mut created = true;
            for level in 0..levels {
                let grad = GradientMap::compute(pyramid.level(level))?;
                let labels = label_map(
                    &grad,
                    self.params.magnitude_threshold,
                    Some(&mask_pyramid[level]),
                )?;
                // The warp rotates about the padded center, so the content
                // box stays centered there at every level.
                let divisor = (1usize << level) as f32;
                let content_box = RotatedBox {
                    center_x: (warped.width() / 2) as f32 / divisor,
                    center_y: (warped.height() / 2) as f32 / divisor,
                    width: content_width as f32 * info.scale / divisor,
                    height: content_height as f32 * info.scale / divisor,
                    angle: info.angle,
                };
                match extract_template(
                    &grad,
                    &labels,
                    &self.params.template_params(level),
                    level,
                    info.scale,
                    content_box,
                ) {
                    Ok(template) => level_templates.push(template),
                    Err(ShapeMatchError::InsufficientFeatures { wanted, got }) => {
                        trace_warn!(
                            "template variant skipped: angle={} scale={} level={} wanted={} got={}",
                            info.angle,
                            info.scale,
                            level,
                            wanted,
                            got,
                        );
                        created = false;
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }

            variants.push(TemplateVariant {
                angle: info.angle,
                scale: info.scale,
                levels: if created { level_templates } else { Vec::new() },
                created,
            });
        }

        self.templates.insert(
            template_id.to_owned(),
            TemplateClass {
                variants,
                angle_step: producer.angle_step,
                scale_step: producer.scale_step,
            },
        );
        Ok(())
    }

    /// One-shot matching: binds `src` and the producer's template under the
    /// `"default"` class and runs the pipeline.
    pub fn match_templates(
        &mut self,
        src: &SourceImage,
        producer: &ShapeInfoProducer,
        score_threshold: f32,
        mask: Option<&OwnedImage<u8>>,
    ) -> ShapeMatchResult<Vec<MatchPoint>> {
        self.add_source(src, mask, DEFAULT_CLASS)?;
        self.add_template(producer, DEFAULT_CLASS)?;
        self.match_class(DEFAULT_CLASS, score_threshold, None)?;
        Ok(self.matches(DEFAULT_CLASS)?.to_vec())
    }

    /// Runs the coarse-to-fine pipeline for a bound class id.
    ///
    /// Requires both a source and a template class stored under `id`. The
    /// resulting matches replace any previous list for the id.
    pub fn match_class(
        &mut self,
        id: &str,
        score_threshold: f32,
        cancel: Option<&CancelToken>,
    ) -> ShapeMatchResult<()> {
        let _span = trace_span!("match_class", id = id).entered();

        let source = self.sources.get(id).ok_or_else(|| ShapeMatchError::IdNotFound {
            id: id.to_owned(),
        })?;
        let class = self.templates.get(id).ok_or_else(|| ShapeMatchError::IdNotFound {
            id: id.to_owned(),
        })?;

        #[cfg(feature = "rayon")]
        let per_variant: Vec<Vec<MatchPoint>> = class
            .variants
            .par_iter()
            .enumerate()
            .map(|(template_id, variant)| {
                match_one_variant(source, variant, template_id, score_threshold, cancel)
            })
            .collect::<ShapeMatchResult<_>>()?;

        #[cfg(not(feature = "rayon"))]
        let per_variant: Vec<Vec<MatchPoint>> = class
            .variants
            .iter()
            .enumerate()
            .map(|(template_id, variant)| {
                match_one_variant(source, variant, template_id, score_threshold, cancel)
            })
            .collect::<ShapeMatchResult<_>>()?;

        let entries: Vec<(MatchPoint, MatchMeta)> = per_variant
            .into_iter()
            .flatten()
            .map(|point| {
                let variant = &class.variants[point.template_id];
                let template = &variant.levels[0];
                let diag = template.rotated_box.diagonal();
                let meta = MatchMeta {
                    cx: point.x as f32 + template.box_width as f32 / 2.0,
                    cy: point.y as f32 + template.box_height as f32 / 2.0,
                    angle: variant.angle,
                    scale: variant.scale,
                    radius: self.params.nms_radius.unwrap_or(diag / 8.0),
                };
                (point, meta)
            })
            .collect();

        let angle_tol = self.params.nms_angle_tol.unwrap_or(class.angle_step);
        let scale_tol = self.params.nms_scale_tol.unwrap_or(class.scale_step);
        let kept = suppress_matches(entries, angle_tol, scale_tol);

        self.matches.insert(id.to_owned(), kept);
        Ok(())
    }

    /// Returns the stored matches for a class id, strongest first.
    pub fn matches(&self, id: &str) -> ShapeMatchResult<&[MatchPoint]> {
        self.matches
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| ShapeMatchError::IdNotFound { id: id.to_owned() })
    }

    /// Returns the stored template variants for a class id.
    pub fn template_variants(&self, id: &str) -> ShapeMatchResult<&[TemplateVariant]> {
        self.templates
            .get(id)
            .map(|class| class.variants.as_slice())
            .ok_or_else(|| ShapeMatchError::IdNotFound { id: id.to_owned() })
    }

    /// Returns the quantized label map of a bound source at one level.
    pub fn quantized_labels(
        &self,
        memory_id: &str,
        level: usize,
    ) -> ShapeMatchResult<&OwnedImage<u8>> {
        let source = self
            .sources
            .get(memory_id)
            .ok_or_else(|| ShapeMatchError::IdNotFound {
                id: memory_id.to_owned(),
            })?;
        source
            .labels
            .get(level)
            .ok_or(ShapeMatchError::InvalidInput {
                reason: "pyramid level out of range",
            })
    }

    /// Resolves stored matches into center-based pose summaries.
    pub fn best_matches(&self, id: &str) -> ShapeMatchResult<Vec<BestMatch>> {
        let class = self.templates.get(id).ok_or_else(|| ShapeMatchError::IdNotFound {
            id: id.to_owned(),
        })?;
        let matches = self.matches(id)?;

        Ok(matches
            .iter()
            .map(|point| {
                let variant = &class.variants[point.template_id];
                let template = &variant.levels[0];
                BestMatch {
                    x: point.x as f32 + template.box_width as f32 / 2.0,
                    y: point.y as f32 + template.box_height as f32 / 2.0,
                    scale: variant.scale,
                    angle: variant.angle,
                    similarity: point.similarity,
                    bounds: template
                        .rotated_box
                        .translated(point.x as f32, point.y as f32),
                }
            })
            .collect())
    }

    /// Stamps the matched templates' feature points into a caller-provided
    /// gray canvas, for quick visual diagnostics.
    pub fn draw(&self, canvas: &mut OwnedImage<u8>, id: &str) -> ShapeMatchResult<()> {
        let class = self.templates.get(id).ok_or_else(|| ShapeMatchError::IdNotFound {
            id: id.to_owned(),
        })?;
        let matches = self.matches(id)?;

        for point in matches {
            let template = &class.variants[point.template_id].levels[0];
            for feature in &template.features {
                let x = point.x + feature.x;
                let y = point.y + feature.y;
                if x < canvas.width() && y < canvas.height() {
                    canvas.set_pixel(x, y, 255);
                }
            }
        }
        Ok(())
    }

    /// Removes every stored entry for a class id.
    pub fn remove_class(&mut self, id: &str) {
        self.sources.remove(id);
        self.templates.remove(id);
        self.matches.remove(id);
    }
}

/// Pixel-resolution candidate during refinement.
#[derive(Copy, Clone)]
struct Candidate {
    x: usize,
    y: usize,
    sum: u32,
}

/// Runs the coarse-to-fine pipeline for a single template variant.
fn match_one_variant(
    source: &SourceMemories,
    variant: &TemplateVariant,
    template_id: usize,
    score_threshold: f32,
    cancel: Option<&CancelToken>,
) -> ShapeMatchResult<Vec<MatchPoint>> {
    if !variant.created {
        return Ok(Vec::new());
    }
    check_cancel(cancel)?;
    debug_assert_eq!(variant.levels.len(), source.levels.len());

    let top = source.levels.len() - 1;
    let mems = &source.levels[top];
    let template = &variant.levels[top];
    let tile = mems.tile;
    let num_features = template.features.len();

    // Coarsest level: full tile-resolution map, then pixel refinement of
    // every tile at or above threshold.
    let sim = similarity_map(mems, template);
    let cols = mems.memories[0].outer_cols();
    let mut candidates: Vec<Candidate> = Vec::new();
    for (idx, &sum) in sim.iter().enumerate() {
        if score_percent(u32::from(sum), num_features) < score_threshold {
            continue;
        }
        let x = (idx % cols) * tile;
        let y = (idx / cols) * tile;
        if !mems.fits(template, x, y) {
            continue;
        }
        let Some(roi) = Roi::around(mems, template, x, y, tile) else {
            continue;
        };
        if let Some((rx, ry, rsum)) = best_in_roi(mems, template, roi) {
            if score_percent(rsum, num_features) >= score_threshold {
                candidates.push(Candidate {
                    x: rx,
                    y: ry,
                    sum: rsum,
                });
            }
        }
    }
    dedup_candidates(&mut candidates);

    // Propagate down the pyramid, re-scoring inside doubled ROIs.
    for level in (0..top).rev() {
        check_cancel(cancel)?;
        if candidates.is_empty() {
            break;
        }
        let mems = &source.levels[level];
        let template = &variant.levels[level];
        let num_features = template.features.len();
        let radius = 2 * mems.tile;

        let mut next: Vec<Candidate> = Vec::new();
        for cand in &candidates {
            let Some(roi) = Roi::around(mems, template, cand.x * 2, cand.y * 2, radius) else {
                continue;
            };
            if let Some((rx, ry, rsum)) = best_in_roi(mems, template, roi) {
                if score_percent(rsum, num_features) >= score_threshold {
                    next.push(Candidate {
                        x: rx,
                        y: ry,
                        sum: rsum,
                    });
                }
            }
        }
        dedup_candidates(&mut next);
        candidates = next;
    }

    let template = &variant.levels[0];
    let num_features = template.features.len();
    Ok(candidates
        .into_iter()
        .map(|cand| MatchPoint {
            x: cand.x,
            y: cand.y,
            template_id,
            similarity: score_percent(cand.sum, num_features).min(100.0),
        })
        .collect())
}

/// Collapses candidates that converged onto the same anchor.
fn dedup_candidates(candidates: &mut Vec<Candidate>) {
    candidates.sort_by(|a, b| (a.y, a.x).cmp(&(b.y, b.x)).then(b.sum.cmp(&a.sum)));
    candidates.dedup_by(|a, b| a.x == b.x && a.y == b.y);
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, Detector, MatchParams};

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.clone().cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn params_validation_rejects_bad_tiles() {
        let params = MatchParams {
            spread_tile: 6,
            ..MatchParams::default()
        };
        assert!(Detector::new(params).is_err());

        let params = MatchParams {
            spread_tile: 16,
            ..MatchParams::default()
        };
        assert!(Detector::new(params).is_err());

        assert!(Detector::new(MatchParams::default()).is_ok());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let detector = Detector::new(MatchParams::default()).unwrap();
        assert!(detector.matches("nope").is_err());
        assert!(detector.template_variants("nope").is_err());
    }
}
