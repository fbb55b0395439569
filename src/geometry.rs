//! Converts oriented bounding boxes into calibrated pick poses.
//!
//! The box edges are reduced to their midpoints. The line between the left
//! and right midpoints gives the pickup angle; the two midpoint distances
//! give the object's extents and decide whether the long axis flips the
//! angle by 90°.

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{OrientedBox, PickPose};
use crate::types::Point2;

/// Reasons a box cannot be turned into a pick pose.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("corner {corner} is not finite: ({x}, {y})")]
    NonFiniteCorner { corner: usize, x: f64, y: f64 },
    #[error("{edge} reference edge has zero length")]
    DegenerateEdge { edge: &'static str },
    #[error("pixels per metric must be positive and finite, got: {0}")]
    InvalidScale(f64),
}

/// Midpoints of the four box edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeMidpoints {
    pub top: Point2,
    pub bottom: Point2,
    pub left: Point2,
    pub right: Point2,
}

impl EdgeMidpoints {
    pub fn of(obox: &OrientedBox) -> Self {
        Self {
            top: obox.top_left.midpoint(&obox.top_right),
            bottom: obox.bottom_left.midpoint(&obox.bottom_right),
            left: obox.top_left.midpoint(&obox.bottom_left),
            right: obox.top_right.midpoint(&obox.bottom_right),
        }
    }

    /// Distance between the top and bottom midpoints (`dA`).
    pub fn vertical_extent(&self) -> f64 {
        self.top.distance_to(&self.bottom)
    }

    /// Distance between the left and right midpoints (`dB`).
    pub fn horizontal_extent(&self) -> f64 {
        self.left.distance_to(&self.right)
    }
}

/// Pick poses for a whole scene plus the boxes that were rejected.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub poses: Vec<PickPose>,
    pub rejected: Vec<(usize, GeometryError)>,
}

/// Turns oriented boxes into pick poses with a fixed calibration scale.
#[derive(Clone, Copy, Debug)]
pub struct GeometryExtractor {
    pixels_per_metric: f64,
}

impl GeometryExtractor {
    /// Creates an extractor.
    ///
    /// # Parameters
    /// * `pixels_per_metric` - Pixels per calibrated unit, must be positive
    pub fn new(pixels_per_metric: f64) -> Result<Self, GeometryError> {
        if !(pixels_per_metric > 0.0 && pixels_per_metric.is_finite()) {
            return Err(GeometryError::InvalidScale(pixels_per_metric));
        }
        Ok(Self { pixels_per_metric })
    }

    /// Computes the pick pose of one box.
    ///
    /// # Parameters
    /// * `id` - Detection index assigned to the object
    /// * `obox` - Ordered corners of the box
    ///
    /// # Returns
    /// The pick pose, or a `GeometryError` for non-finite or degenerate boxes
    pub fn extract(&self, id: usize, obox: &OrientedBox) -> Result<PickPose, GeometryError> {
        for (corner, point) in obox.corners().iter().enumerate() {
            if !point.is_finite() {
                return Err(GeometryError::NonFiniteCorner {
                    corner,
                    x: point.x,
                    y: point.y,
                });
            }
        }

        let mid = EdgeMidpoints::of(obox);
        let d_a = mid.vertical_extent();
        let d_b = mid.horizontal_extent();
        if d_b == 0.0 {
            return Err(GeometryError::DegenerateEdge {
                edge: "left/right",
            });
        }
        if d_a == 0.0 {
            return Err(GeometryError::DegenerateEdge {
                edge: "top/bottom",
            });
        }

        // Image Y grows downward.
        let dy = -(mid.right.y - mid.left.y);
        let dx = mid.right.x - mid.left.x;
        let mut angle = dy.atan2(dx).to_degrees();
        if d_b >= d_a {
            angle += 90.0;
        }

        let pose = PickPose {
            id,
            center: obox.top_left.midpoint(&obox.bottom_right),
            width: d_b / self.pixels_per_metric,
            height: d_a / self.pixels_per_metric,
            angle,
        };
        debug!(
            id,
            center_x = pose.center.x,
            center_y = pose.center.y,
            angle = pose.angle,
            "pick pose extracted"
        );
        Ok(pose)
    }

    /// Extracts every box of a scene.
    ///
    /// Ids are the input positions. A box that fails keeps its id unused;
    /// later boxes are not renumbered.
    pub fn extract_all(&self, boxes: &[OrientedBox]) -> Extraction {
        let mut extraction = Extraction::default();
        for (id, obox) in boxes.iter().enumerate() {
            match self.extract(id, obox) {
                Ok(pose) => extraction.poses.push(pose),
                Err(err) => {
                    warn!(id, error = %err, "object skipped: invalid geometry");
                    extraction.rejected.push((id, err));
                }
            }
        }
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(corners: [[f64; 2]; 4]) -> OrientedBox {
        OrientedBox::from_corners(corners)
    }

    #[test]
    fn wide_box_gets_quarter_turn() {
        // dA = 4 (top/bottom), dB = 10 (left/right)
        let extractor = GeometryExtractor::new(9.0).unwrap();
        let pose = extractor
            .extract(0, &boxed([[0.0, 0.0], [10.0, 0.0], [10.0, 4.0], [0.0, 4.0]]))
            .unwrap();

        assert!((pose.width - 1.11).abs() < 0.01);
        assert!((pose.height - 0.44).abs() < 0.01);
        assert_eq!(pose.center, Point2::new(5.0, 2.0));
        assert!((pose.angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn tall_box_keeps_raw_angle() {
        let extractor = GeometryExtractor::new(9.0).unwrap();
        let pose = extractor
            .extract(0, &boxed([[0.0, 0.0], [4.0, 0.0], [4.0, 10.0], [0.0, 10.0]]))
            .unwrap();

        assert!(pose.angle.abs() < 1e-9);
        assert!((pose.width - 4.0 / 9.0).abs() < 1e-12);
        assert!((pose.height - 10.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn square_box_counts_as_long_axis_flip() {
        let extractor = GeometryExtractor::new(1.0).unwrap();
        let pose = extractor
            .extract(0, &boxed([[0.0, 0.0], [6.0, 0.0], [6.0, 6.0], [0.0, 6.0]]))
            .unwrap();

        assert!((pose.angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn tilted_box_uses_inverted_y() {
        // Left midpoint (1.5, 8), right midpoint (9.5, 2): rises to the right on screen.
        let extractor = GeometryExtractor::new(1.0).unwrap();
        let pose = extractor
            .extract(0, &boxed([[0.0, 6.0], [8.0, 0.0], [11.0, 4.0], [3.0, 10.0]]))
            .unwrap();

        let raw = 6.0_f64.atan2(8.0).to_degrees();
        assert!((pose.angle - (raw + 90.0)).abs() < 1e-9);
        assert!((pose.width - 10.0).abs() < 1e-9);
        assert!((pose.height - 5.0).abs() < 1e-9);
        assert_eq!(pose.center, Point2::new(5.5, 5.0));
    }

    #[test]
    fn tilted_tall_box_descending_gives_negative_angle() {
        // Left midpoint (-2, 2), right midpoint (0, 4): falls to the right on screen.
        let extractor = GeometryExtractor::new(1.0).unwrap();
        let obox = boxed([[0.0, 0.0], [2.0, 2.0], [-2.0, 6.0], [-4.0, 4.0]]);

        let mid = EdgeMidpoints::of(&obox);
        assert!(mid.horizontal_extent() < mid.vertical_extent());

        let pose = extractor.extract(0, &obox).unwrap();
        assert!((pose.angle + 45.0).abs() < 1e-9);
    }

    #[test]
    fn extraction_is_bit_identical() {
        let extractor = GeometryExtractor::new(7.3).unwrap();
        let obox = boxed([[1.3, 2.7], [9.1, 0.4], [10.6, 5.9], [2.8, 8.2]]);

        let first = extractor.extract(2, &obox).unwrap();
        let second = extractor.extract(2, &obox).unwrap();
        assert_eq!(first.angle.to_bits(), second.angle.to_bits());
        assert_eq!(first.width.to_bits(), second.width.to_bits());
        assert_eq!(first.height.to_bits(), second.height.to_bits());
        assert_eq!(first, second);
    }

    #[test]
    fn collapsed_box_is_rejected() {
        let extractor = GeometryExtractor::new(9.0).unwrap();
        let point = [[3.0, 3.0]; 4];
        assert!(matches!(
            extractor.extract(0, &boxed(point)),
            Err(GeometryError::DegenerateEdge { .. })
        ));

        let flat = boxed([[0.0, 0.0], [10.0, 0.0], [10.0, 0.0], [0.0, 0.0]]);
        assert_eq!(
            extractor.extract(0, &flat),
            Err(GeometryError::DegenerateEdge {
                edge: "top/bottom"
            })
        );
    }

    #[test]
    fn non_finite_corner_is_rejected() {
        let extractor = GeometryExtractor::new(9.0).unwrap();
        let obox = boxed([[0.0, 0.0], [f64::NAN, 0.0], [10.0, 4.0], [0.0, 4.0]]);
        assert!(matches!(
            extractor.extract(0, &obox),
            Err(GeometryError::NonFiniteCorner { corner: 1, .. })
        ));
    }

    #[test]
    fn invalid_scale_is_rejected() {
        assert!(GeometryExtractor::new(0.0).is_err());
        assert!(GeometryExtractor::new(-9.0).is_err());
        assert!(GeometryExtractor::new(f64::NAN).is_err());
    }

    #[test]
    fn extract_all_keeps_ids_of_valid_boxes() {
        let extractor = GeometryExtractor::new(1.0).unwrap();
        let boxes = vec![
            boxed([[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]]),
            boxed([[5.0, 5.0]; 4]),
            boxed([[8.0, 0.0], [10.0, 0.0], [10.0, 6.0], [8.0, 6.0]]),
        ];

        let extraction = extractor.extract_all(&boxes);
        let ids: Vec<usize> = extraction.poses.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(extraction.rejected.len(), 1);
        assert_eq!(extraction.rejected[0].0, 1);
    }
}
