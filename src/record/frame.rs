use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Pipeline timing for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameStats {
    pub fps: f32,
    pub inference_ms: f32,
    pub tracking_ms: f32,
    pub total_ms: f32,
}

impl FrameStats {
    pub fn new(fps: f32, inference_ms: f32, tracking_ms: f32) -> Self {
        Self {
            fps,
            inference_ms,
            tracking_ms,
            total_ms: inference_ms + tracking_ms,
        }
    }
}

/// Frame-level fields supplied by the caller alongside the detections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameMeta {
    pub frame_number: u32,
    /// Seconds, monotonically increasing per source
    pub timestamp: f64,
    pub source_id: String,
    pub width: u32,
    pub height: u32,
    pub stats: FrameStats,
}

/// Metadata derived for one retained object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectRecord {
    pub track_id: u64,
    pub bbox: Rect,
    pub class_id: i32,
    pub class_name: String,
    pub confidence: f32,
    /// `None` until the track has a full window, or when the estimate was
    /// implausible
    pub speed: Option<f32>,
    /// Decoded text, empty when none
    pub text: String,
    pub text_confidence: f32,
    pub timestamp: f64,
    pub is_overspeed: bool,
}

/// All retained objects of one frame, in detector order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameRecord {
    pub frame_number: u32,
    pub timestamp: f64,
    pub source_id: String,
    pub width: u32,
    pub height: u32,
    pub stats: FrameStats,
    pub objects: Vec<ObjectRecord>,
}

impl FrameRecord {
    pub fn from_meta(meta: FrameMeta, objects: Vec<ObjectRecord>) -> Self {
        Self {
            frame_number: meta.frame_number,
            timestamp: meta.timestamp,
            source_id: meta.source_id,
            width: meta.width,
            height: meta.height,
            stats: meta.stats,
            objects,
        }
    }

    pub fn overspeed_count(&self) -> usize {
        self.objects.iter().filter(|o| o.is_overspeed).count()
    }
}
