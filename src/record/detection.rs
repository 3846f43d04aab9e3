//! Detector/tracker output for one object in one frame.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Result attached to an object by a secondary classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOutput {
    /// Id of the classifier that produced this output
    pub component_id: i32,
    /// Label already resolved by the classifier
    pub label: Option<String>,
    /// Confidence reported with `label`
    pub label_confidence: f32,
    /// Raw `T x N` per-step class probabilities
    pub probabilities: Option<Array2<f32>>,
}

impl ClassifierOutput {
    pub fn label(component_id: i32, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            component_id,
            label: Some(label.into()),
            label_confidence: confidence,
            probabilities: None,
        }
    }

    pub fn probabilities(component_id: i32, probabilities: Array2<f32>) -> Self {
        Self {
            component_id,
            probabilities: Some(probabilities),
            ..Default::default()
        }
    }
}

/// One tracked object as delivered by the upstream tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Identity stable across frames for the same physical object
    pub track_id: u64,
    /// Bounding box in image pixels (TLWH)
    pub bbox: Rect,
    pub class_id: i32,
    /// Detection confidence, 0 to 1
    pub confidence: f32,
    #[serde(default)]
    pub classifiers: Vec<ClassifierOutput>,
}

impl DetectedObject {
    pub fn new(track_id: u64, bbox: Rect, class_id: i32, confidence: f32) -> Self {
        Self {
            track_id,
            bbox,
            class_id,
            confidence,
            classifiers: Vec::new(),
        }
    }

    pub fn with_classifier(mut self, output: ClassifierOutput) -> Self {
        self.classifiers.push(output);
        self
    }
}

/// Builder for `DetectedObject` from the common box formats.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    track_id: u64,
    bbox: Rect,
    class_id: i32,
    score: f32,
    classifiers: Vec<ClassifierOutput>,
}

impl DetectionBuilder {
    pub fn new(track_id: u64) -> Self {
        Self {
            track_id,
            ..Default::default()
        }
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(cx - w / 2.0, cy - h / 2.0, w, h);
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, left: f32, top: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(left, top, w, h);
        self
    }

    pub fn class(mut self, class_id: i32) -> Self {
        self.class_id = class_id;
        self
    }

    /// Set the confidence score.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn classifier(mut self, output: ClassifierOutput) -> Self {
        self.classifiers.push(output);
        self
    }

    pub fn build(self) -> DetectedObject {
        DetectedObject {
            track_id: self.track_id,
            bbox: self.bbox,
            class_id: self.class_id,
            confidence: self.score,
            classifiers: self.classifiers,
        }
    }
}
