//! Shapematch: rotation- and scale-invariant shape-based template matching.
//!
//! The matcher represents template and search images by quantized gradient
//! orientations, spreads them over a tile-sized neighborhood, precomputes
//! per-orientation response maps, reorganizes those into cache-friendly
//! linear memories, and searches a coarse-to-fine pyramid over every
//! configured (angle, scale) template variant.
//!
//! Typical use: build a [`ShapeInfoProducer`] around the template image,
//! configure its angle/scale ranges, and hand it to
//! [`Detector::match_templates`] together with the search image.

pub mod gradient;
pub mod image;
pub mod response;
pub mod search;
pub mod shapeinfo;
pub mod template;
mod trace;
pub mod util;

pub use image::{ImageView, OwnedImage, SourceImage};
pub use search::{
    BestMatch, CancelToken, Detector, MatchParams, MatchPoint, TemplateVariant, DEFAULT_CLASS,
};
pub use shapeinfo::{ProducerConfig, ShapeInfo, ShapeInfoProducer};
pub use template::{Feature, RotatedBox, ShapeTemplate, TemplateParams};
pub use util::{ShapeMatchError, ShapeMatchResult};
