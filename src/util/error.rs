//! Error types for shapematch.

use thiserror::Error;

/// Result alias for shapematch operations.
pub type ShapeMatchResult<T> = std::result::Result<T, ShapeMatchError>;

/// Errors that can occur when running shapematch operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeMatchError {
    /// The provided input is structurally invalid (empty image, bad level count).
    #[error("invalid input: {reason}")]
    InvalidInput { reason: &'static str },
    /// The provided dimensions are invalid (must be non-zero).
    #[error("invalid dimensions: width={width} height={height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The provided stride is smaller than the image width.
    #[error("invalid stride: width={width} stride={stride}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer is too small for the requested view.
    #[error("buffer too small: needed={needed} got={got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The mask dimensions do not match the image dimensions.
    #[error("mask mismatch: image={img_width}x{img_height} mask={mask_width}x{mask_height}")]
    MaskMismatch {
        img_width: usize,
        img_height: usize,
        mask_width: usize,
        mask_height: usize,
    },
    /// A configuration parameter is out of its valid range.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
    /// Feature scatter could not reach the requested count at the distance floor.
    #[error("insufficient features: wanted={wanted} got={got}")]
    InsufficientFeatures { wanted: usize, got: usize },
    /// The shape-info producer emitted no (angle, scale) pairs.
    #[error("shape info exhausted: angle/scale ranges produced no entries")]
    ShapeInfoExhausted,
    /// A named source, template or match class was never added.
    #[error("id not found: {id}")]
    IdNotFound { id: String },
    /// Cooperative cancellation fired between levels or templates.
    #[error("match cancelled")]
    Cancelled,
    /// Image decoding or loading failed.
    #[cfg(feature = "image-io")]
    #[error("image io failed: {reason}")]
    ImageIo { reason: String },
}
