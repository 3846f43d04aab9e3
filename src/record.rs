//! Per-frame records assembled from tracker detections.

mod builder;
mod classes;
mod detection;
mod frame;

pub use builder::FrameRecordBuilder;
pub use classes::ClassTable;
pub use detection::{ClassifierOutput, DetectedObject, DetectionBuilder};
pub use frame::{FrameMeta, FrameRecord, FrameStats, ObjectRecord};
