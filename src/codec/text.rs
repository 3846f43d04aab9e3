//! Human-readable JSON rendering of a frame.
//!
//! Owned records and encoded views go through the same serializable shape,
//! so both render to identical text.

use serde::Serialize;

use crate::codec::{FrameView, ObjectView};
use crate::record::{FrameRecord, ObjectRecord};

#[derive(Serialize)]
struct FrameText<'a> {
    frame_number: u32,
    timestamp: f64,
    source_id: &'a str,
    width: u32,
    height: u32,
    fps: f32,
    inference_ms: f32,
    tracking_ms: f32,
    total_ms: f32,
    object_count: usize,
    objects: Vec<ObjectText<'a>>,
}

#[derive(Serialize)]
struct ObjectText<'a> {
    track_id: u64,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    class_id: i32,
    class_name: &'a str,
    confidence: f32,
    /// Rounded to whole units, 0 when undetermined
    speed: i64,
    text: &'a str,
    is_overspeed: bool,
}

fn speed_text(speed: Option<f32>) -> i64 {
    speed.map_or(0, |s| s.round() as i64)
}

impl<'a> From<&'a ObjectRecord> for ObjectText<'a> {
    fn from(o: &'a ObjectRecord) -> Self {
        Self {
            track_id: o.track_id,
            x: o.bbox.x,
            y: o.bbox.y,
            width: o.bbox.width,
            height: o.bbox.height,
            class_id: o.class_id,
            class_name: &o.class_name,
            confidence: o.confidence,
            speed: speed_text(o.speed),
            text: &o.text,
            is_overspeed: o.is_overspeed,
        }
    }
}

impl<'a> From<ObjectView<'a>> for ObjectText<'a> {
    fn from(o: ObjectView<'a>) -> Self {
        let bbox = o.bbox();
        Self {
            track_id: o.track_id(),
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            class_id: o.class_id(),
            class_name: o.class_name(),
            confidence: o.confidence(),
            speed: speed_text(o.speed()),
            text: o.text(),
            is_overspeed: o.is_overspeed(),
        }
    }
}

fn render(frame: &FrameText<'_>) -> String {
    // Plain structs of numbers and strings; serde_json writes non-finite
    // floats as null rather than failing.
    serde_json::to_string(frame).unwrap_or_else(|_| String::from("{}"))
}

pub(crate) fn record_to_text(frame: &FrameRecord) -> String {
    let objects: Vec<ObjectText<'_>> = frame.objects.iter().map(ObjectText::from).collect();
    render(&FrameText {
        frame_number: frame.frame_number,
        timestamp: frame.timestamp,
        source_id: &frame.source_id,
        width: frame.width,
        height: frame.height,
        fps: frame.stats.fps,
        inference_ms: frame.stats.inference_ms,
        tracking_ms: frame.stats.tracking_ms,
        total_ms: frame.stats.total_ms,
        object_count: objects.len(),
        objects,
    })
}

pub(crate) fn view_to_text(view: &FrameView<'_>) -> String {
    let objects: Vec<ObjectText<'_>> = view.objects().map(ObjectText::from).collect();
    let stats = view.stats();
    render(&FrameText {
        frame_number: view.frame_number(),
        timestamp: view.timestamp(),
        source_id: view.source_id(),
        width: view.width(),
        height: view.height(),
        fps: stats.fps,
        inference_ms: stats.inference_ms,
        tracking_ms: stats.tracking_ms,
        total_ms: stats.total_ms,
        object_count: objects.len(),
        objects,
    })
}
