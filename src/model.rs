//! Data models for pick-and-place planning.
//!
//! This module defines the records that flow between the pipeline stages:
//! - `OrientedBox`: four ordered corners of a detected object (pixel space)
//! - `PickPose`: where and at which angle the gripper picks an object
//! - `PackingRequest` / `Placement`: the solver's input and output records
//! - `DropPose`: where and at which angle the object is released in the bin
//! - `HandoffItem`: one pick/drop pair as served to the robot controller

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Point2, Rect};

/// Validation error for planning inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
}

/// Helper function to validate a single dimension.
fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Rotated bounding box of one detected object.
///
/// Corners are ordered top-left, top-right, bottom-right, bottom-left. The
/// order is established by the vision front-end and taken as given.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub top_left: Point2,
    pub top_right: Point2,
    pub bottom_right: Point2,
    pub bottom_left: Point2,
}

impl OrientedBox {
    pub fn new(
        top_left: Point2,
        top_right: Point2,
        bottom_right: Point2,
        bottom_left: Point2,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Builds a box from `[tl, tr, br, bl]` coordinate pairs.
    pub fn from_corners(corners: [[f64; 2]; 4]) -> Self {
        Self::new(
            corners[0].into(),
            corners[1].into(),
            corners[2].into(),
            corners[3].into(),
        )
    }

    pub fn corners(&self) -> [Point2; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Pick pose of one object.
///
/// # Fields
/// * `id` - Position in left-to-right detection order
/// * `center` - Pick point in pixel space
/// * `width` - Left/right extent in calibrated units
/// * `height` - Top/bottom extent in calibrated units
/// * `angle` - Pickup angle in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PickPose {
    pub id: usize,
    pub center: Point2,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

/// One rectangle handed to the packing solver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PackingRequest {
    pub width: f64,
    pub height: f64,
    pub id: usize,
}

impl PackingRequest {
    /// Derives the request for a pick pose.
    ///
    /// The solver's width is the object's left/right extent and its height
    /// the top/bottom extent. This is the only place the mapping is made.
    pub fn from_pick_pose(pose: &PickPose) -> Self {
        Self {
            width: pose.width,
            height: pose.height,
            id: pose.id,
        }
    }
}

/// The single bin objects are packed into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BinSpec {
    pub width: f64,
    pub height: f64,
}

impl BinSpec {
    /// Creates a bin after validating its dimensions.
    pub fn new(width: f64, height: f64) -> Result<Self, ValidationError> {
        validate_dimension(width, "Bin width")?;
        validate_dimension(height, "Bin height")?;
        Ok(Self { width, height })
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Placement chosen by the solver for one request.
///
/// `width` and `height` are the placed dimensions and are swapped relative
/// to the request when the solver rotated the piece.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Placement {
    pub bin_index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub id: usize,
}

impl Placement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Drop orientation relative to the pick orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DropAngle {
    Aligned,
    Rotated,
}

impl DropAngle {
    pub fn degrees(self) -> f64 {
        match self {
            DropAngle::Aligned => 0.0,
            DropAngle::Rotated => 90.0,
        }
    }
}

/// Drop pose of one placed object.
///
/// `length` and `height` are the request dimensions; rotation changes the
/// orientation only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DropPose {
    pub id: usize,
    pub drop: Point2,
    pub angle: DropAngle,
    pub length: f64,
    pub height: f64,
}

/// One object as scheduled on the handoff server.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandoffItem {
    pub pick: PickPose,
    pub drop: DropPose,
}

impl HandoffItem {
    pub fn id(&self) -> usize {
        self.pick.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_spec_rejects_non_positive_dimensions() {
        assert!(BinSpec::new(25.0, 25.0).is_ok());
        assert!(BinSpec::new(0.0, 25.0).is_err());
        assert!(BinSpec::new(25.0, -1.0).is_err());
        assert!(BinSpec::new(f64::NAN, 25.0).is_err());
        assert!(BinSpec::new(25.0, f64::INFINITY).is_err());
    }

    #[test]
    fn packing_request_keeps_pose_extents() {
        let pose = PickPose {
            id: 4,
            center: Point2::new(12.0, 8.0),
            width: 3.5,
            height: 1.25,
            angle: 90.0,
        };

        let request = PackingRequest::from_pick_pose(&pose);
        assert_eq!(request.id, 4);
        assert_eq!(request.width, 3.5);
        assert_eq!(request.height, 1.25);
    }

    #[test]
    fn oriented_box_from_corners_keeps_order() {
        let obox = OrientedBox::from_corners([[0.0, 0.0], [10.0, 0.0], [10.0, 4.0], [0.0, 4.0]]);
        assert_eq!(obox.top_right, Point2::new(10.0, 0.0));
        assert_eq!(obox.bottom_left, Point2::new(0.0, 4.0));
        assert_eq!(obox.corners()[2], Point2::new(10.0, 4.0));
    }

    #[test]
    fn drop_angle_degrees() {
        assert_eq!(DropAngle::Aligned.degrees(), 0.0);
        assert_eq!(DropAngle::Rotated.degrees(), 90.0);
    }
}
