//! Non-maximum suppression of match hits.
//!
//! Matches are ranked by similarity (ties: smaller template id, then smaller
//! `(y, x)`) and kept greedily. A later match is discarded only when it lies
//! within the suppression radius of a kept match AND has a similar pose, so
//! overlapping hits with genuinely different orientation or scale survive.

use crate::search::MatchPoint;
use crate::util::math::angle_dist_deg;
use std::cmp::Ordering;

/// Pose and geometry of a match used during suppression.
#[derive(Copy, Clone, Debug)]
pub(crate) struct MatchMeta {
    /// Match center x in level-0 pixels.
    pub(crate) cx: f32,
    /// Match center y in level-0 pixels.
    pub(crate) cy: f32,
    /// Variant rotation angle in degrees.
    pub(crate) angle: f32,
    /// Variant scale.
    pub(crate) scale: f32,
    /// Suppression radius owned by this match (template diagonal / 8 unless
    /// overridden).
    pub(crate) radius: f32,
}

/// Ranking order for match points: similarity descending, then smaller
/// template id, then smaller `(y, x)`.
pub(crate) fn rank(a: &MatchPoint, b: &MatchPoint) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then(a.template_id.cmp(&b.template_id))
        .then(a.y.cmp(&b.y))
        .then(a.x.cmp(&b.x))
}

/// Suppresses duplicate hits, returning survivors in rank order.
pub(crate) fn suppress_matches(
    mut entries: Vec<(MatchPoint, MatchMeta)>,
    angle_tol: f32,
    scale_tol: f32,
) -> Vec<MatchPoint> {
    entries.sort_by(|a, b| rank(&a.0, &b.0));

    let mut kept: Vec<(MatchPoint, MatchMeta)> = Vec::new();
    'outer: for (point, meta) in entries {
        for (_, kept_meta) in &kept {
            let dx = meta.cx - kept_meta.cx;
            let dy = meta.cy - kept_meta.cy;
            let close = dx * dx + dy * dy <= kept_meta.radius * kept_meta.radius;
            let similar_pose = angle_dist_deg(meta.angle, kept_meta.angle) <= angle_tol
                && (meta.scale - kept_meta.scale).abs() <= scale_tol;
            if close && similar_pose {
                continue 'outer;
            }
        }
        kept.push((point, meta));
    }

    kept.into_iter().map(|(point, _)| point).collect()
}

#[cfg(test)]
mod tests {
    use super::{suppress_matches, MatchMeta};
    use crate::search::MatchPoint;

    fn entry(
        x: usize,
        y: usize,
        similarity: f32,
        angle: f32,
        radius: f32,
    ) -> (MatchPoint, MatchMeta) {
        (
            MatchPoint {
                x,
                y,
                template_id: 0,
                similarity,
            },
            MatchMeta {
                cx: x as f32,
                cy: y as f32,
                angle,
                scale: 1.0,
                radius,
            },
        )
    }

    #[test]
    fn close_similar_matches_collapse_to_strongest() {
        let kept = suppress_matches(
            vec![
                entry(100, 100, 90.0, 0.0, 10.0),
                entry(103, 100, 95.0, 0.0, 10.0),
                entry(98, 99, 85.0, 0.0, 10.0),
            ],
            5.0,
            0.1,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].x, 103);
    }

    #[test]
    fn distant_matches_survive() {
        let kept = suppress_matches(
            vec![
                entry(100, 100, 95.0, 0.0, 10.0),
                entry(200, 100, 90.0, 0.0, 10.0),
            ],
            5.0,
            0.1,
        );
        assert_eq!(kept.len(), 2);
        // Rank order: strongest first.
        assert!(kept[0].similarity >= kept[1].similarity);
    }

    #[test]
    fn different_pose_is_not_suppressed() {
        let kept = suppress_matches(
            vec![
                entry(100, 100, 95.0, 0.0, 10.0),
                entry(101, 100, 90.0, 45.0, 10.0),
            ],
            5.0,
            0.1,
        );
        assert_eq!(kept.len(), 2);
    }
}
