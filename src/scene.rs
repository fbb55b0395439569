//! Scene files produced by the vision front-end.
//!
//! A scene is the ordered list of detected objects of one captured image,
//! already sorted left to right:
//!
//! ```json
//! { "detections": [ { "corners": [[0, 0], [10, 0], [10, 4], [0, 4]], "area": 40.0 } ] }
//! ```
//!
//! `area` is the contour area in px² and may be omitted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::OrientedBox;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("could not read scene file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse scene file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One detected object.
#[derive(Clone, Debug, Deserialize)]
pub struct Detection {
    /// Corners in top-left, top-right, bottom-right, bottom-left order.
    pub corners: [[f64; 2]; 4],
    #[serde(default)]
    pub area: Option<f64>,
}

impl Detection {
    pub fn oriented_box(&self) -> OrientedBox {
        OrientedBox::from_corners(self.corners)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let raw = fs::read_to_string(path).map_err(|source| SceneError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Boxes that pass the minimum-area filter, in detection order.
    ///
    /// Detections without an area are kept. The position in the returned
    /// list becomes the object id.
    pub fn boxes(&self, min_area: f64) -> Vec<OrientedBox> {
        self.detections
            .iter()
            .enumerate()
            .filter(|(index, detection)| match detection.area {
                Some(area) if area < min_area => {
                    debug!(index, area, min_area, "detection below minimum area dropped");
                    false
                }
                _ => true,
            })
            .map(|(_, detection)| detection.oriented_box())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::types::Point2;

    const SAMPLE: &str = r#"{
        "detections": [
            { "corners": [[0, 0], [10, 0], [10, 4], [0, 4]], "area": 40.0 },
            { "corners": [[20, 0], [22, 0], [22, 2], [20, 2]], "area": 4.0 },
            { "corners": [[30, 0], [34, 0], [34, 10], [30, 10]] }
        ]
    }"#;

    #[test]
    fn parses_corners_and_optional_area() {
        let scene = Scene::from_json(SAMPLE).expect("Should parse valid JSON");
        assert_eq!(scene.detections.len(), 3);
        assert_eq!(scene.detections[0].area, Some(40.0));
        assert_eq!(scene.detections[2].area, None);
        assert_eq!(
            scene.detections[0].oriented_box().bottom_right,
            Point2::new(10.0, 4.0)
        );
    }

    #[test]
    fn min_area_filter_keeps_order() {
        let scene = Scene::from_json(SAMPLE).unwrap();
        let boxes = scene.boxes(10.0);

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].top_left, Point2::new(0.0, 0.0));
        assert_eq!(boxes[1].top_left, Point2::new(30.0, 0.0));
    }

    #[test]
    fn zero_min_area_keeps_everything() {
        let scene = Scene::from_json(SAMPLE).unwrap();
        assert_eq!(scene.boxes(0.0).len(), 3);
    }

    #[test]
    fn rejects_boxes_with_wrong_corner_count() {
        let raw = r#"{ "detections": [ { "corners": [[0, 0], [1, 0], [1, 1]] } ] }"#;
        assert!(Scene::from_json(raw).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let scene = Scene::load(file.path()).unwrap();
        assert_eq!(scene.detections.len(), 3);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let err = Scene::load(&path).unwrap_err();
        assert!(matches!(err, SceneError::Read { .. }));
        assert!(err.to_string().contains("missing.json"));
    }
}
