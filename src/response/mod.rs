//! Orientation spreading and per-orientation response maps.
//!
//! Spreading ORs every bitmask inside a `T x T` window centered on the pixel,
//! making the downstream correlation tolerant to misalignments up to the tile
//! size. The response maps then score each pixel against the 16 reference
//! orientations through a 65536 x 16 lookup table built once per detector.

use crate::image::OwnedImage;
use crate::util::{ShapeMatchError, ShapeMatchResult};

pub mod linear;

/// Number of reference orientations.
pub const NUM_ORIENTATIONS: usize = 16;

/// Fixed-point maximum of a response-map value (perfect cosine alignment).
pub const MAX_RESPONSE: u8 = 4;

/// Angular width of one quantization bin in degrees (360 / 32, folded).
const BIN_DEG: f32 = 360.0 / 32.0;

/// Lookup table mapping (spread bitmask, reference orientation) to the best
/// absolute cosine between any present orientation and the reference, in
/// fixed point [0, MAX_RESPONSE].
///
/// Built once at detector construction and shared read-only afterwards.
#[derive(Debug)]
pub struct SimilarityLut {
    table: Vec<u8>,
}

impl SimilarityLut {
    /// Precomputes all 65536 x 16 responses.
    pub fn new() -> Self {
        // Response of a single present label b against reference k. Labels
        // fold opposite directions, so the widest separation is 90 degrees.
        let mut single = [[0u8; NUM_ORIENTATIONS]; NUM_ORIENTATIONS];
        for (b, row) in single.iter_mut().enumerate() {
            for (k, value) in row.iter_mut().enumerate() {
                let delta = (b as f32 - k as f32) * BIN_DEG;
                let cos = delta.to_radians().cos().abs();
                *value = (cos * MAX_RESPONSE as f32).round() as u8;
            }
        }

        // Dynamic programming over bit subsets: dropping the lowest set bit
        // reuses an already computed entry.
        let mut table = vec![0u8; NUM_ORIENTATIONS * (1 << 16)];
        for k in 0..NUM_ORIENTATIONS {
            let base = k << 16;
            for bits in 1usize..(1 << 16) {
                let low = bits.trailing_zeros() as usize;
                let rest = table[base + (bits & (bits - 1))];
                table[base + bits] = rest.max(single[low][k]);
            }
        }

        Self { table }
    }

    /// Returns the fixed-point response of `bits` against orientation `k`.
    #[inline]
    pub fn response(&self, bits: u16, orientation: usize) -> u8 {
        debug_assert!(orientation < NUM_ORIENTATIONS);
        self.table[(orientation << 16) + bits as usize]
    }
}

impl Default for SimilarityLut {
    fn default() -> Self {
        Self::new()
    }
}

/// ORs every bitmask inside a centered `T x T` window into each pixel.
///
/// For even T the window covers offsets `[-(T/2 - 1), T/2]` on both axes, so
/// any tile-aligned placement within the tile still sees every orientation.
pub fn spread(src: &OwnedImage<u16>, tile: usize) -> ShapeMatchResult<OwnedImage<u16>> {
    if tile == 0 {
        return Err(ShapeMatchError::InvalidConfig {
            reason: "spread tile must be at least 1",
        });
    }

    let width = src.width();
    let height = src.height();
    let lo = -((tile as isize - 1) / 2);
    let hi = (tile / 2) as isize;
    let mut out = OwnedImage::filled(width, height, 0u16)?;

    for dy in lo..=hi {
        for dx in lo..=hi {
            for y in 0..height as isize {
                let sy = y + dy;
                if sy < 0 || sy >= height as isize {
                    continue;
                }
                let src_row = src.row(sy as usize);
                let dst_row = out.row_mut(y as usize);
                let (dst_start, src_start) = if dx >= 0 {
                    (0usize, dx as usize)
                } else {
                    ((-dx) as usize, 0usize)
                };
                if dst_start.max(src_start) >= width {
                    continue;
                }
                let len = width - dst_start.max(src_start);
                for (dst, &bits) in dst_row[dst_start..dst_start + len]
                    .iter_mut()
                    .zip(&src_row[src_start..src_start + len])
                {
                    *dst |= bits;
                }
            }
        }
    }

    Ok(out)
}

/// Computes the 16 response maps of a spread bitmask image.
pub fn response_maps(spread: &OwnedImage<u16>, lut: &SimilarityLut) -> Vec<OwnedImage<u8>> {
    let width = spread.width();
    let height = spread.height();
    let bits = spread.as_slice();

    (0..NUM_ORIENTATIONS)
        .map(|k| {
            let data = bits.iter().map(|&b| lut.response(b, k)).collect();
            OwnedImage::new(data, width, height).expect("response output is contiguous")
        })
        .collect()
}
