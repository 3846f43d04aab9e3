//! Per-frame tracking metadata: homography speed estimation, sequence text
//! decoding and a verified, zero-copy binary codec.
//!
//! The crate consumes detections from an external detector/tracker and
//! produces one [`FrameRecord`] per frame, which [`MetadataCodec`] turns into a
//! compact buffer and back.

pub mod codec;
pub mod config;
pub mod geometry;
pub mod pipeline;
pub mod record;
pub mod speed;
pub mod text;

pub use codec::{EncodeError, FrameView, MetadataCodec, ObjectView, VerifyError};
pub use config::{ConfigError, EngineConfig, ValidationConfig};
pub use geometry::{Homography, Rect, WorldPoint};
pub use pipeline::{FrameSource, MetadataPipeline, SourceRouter, TrackedFrame};
pub use record::{
    ClassTable, ClassifierOutput, DetectedObject, FrameMeta, FrameRecord, FrameRecordBuilder,
    FrameStats, ObjectRecord,
};
pub use speed::{SpeedEstimator, SpeedGate, TrackArena};
pub use text::{Alphabet, DecodeError, DecodedText, SequenceDecoder};
