//! MetadataPipeline for turning tracked frames into encoded metadata.

use crate::codec::{EncodeError, MetadataCodec};
use crate::config::{ConfigError, EngineConfig};
use crate::pipeline::TrackedFrame;
use crate::record::{DetectedObject, FrameMeta, FrameRecord, FrameRecordBuilder};

/// Record builder and codec for a single video source.
///
/// Not meant to be shared between sources: the builder holds per-track
/// history keyed by track id alone.
#[derive(Debug, Clone)]
pub struct MetadataPipeline {
    builder: FrameRecordBuilder,
    codec: MetadataCodec,
    record: FrameRecord,
}

impl MetadataPipeline {
    pub fn new(builder: FrameRecordBuilder) -> Self {
        Self {
            builder,
            codec: MetadataCodec::new(),
            record: FrameRecord::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(FrameRecordBuilder::from_config(config)?))
    }

    /// Build and encode the record for one frame.
    ///
    /// # Arguments
    /// * `meta` - Frame-level fields
    /// * `objects` - Tracked objects in detector order
    ///
    /// # Returns
    /// The encoded frame, valid until the next call.
    pub fn process_frame(
        &mut self,
        meta: FrameMeta,
        objects: &[DetectedObject],
    ) -> Result<&[u8], EncodeError> {
        self.record = self.builder.build(meta, objects);
        self.codec.encode(&self.record)
    }

    /// Release lost tracks, then process the frame.
    pub fn process(&mut self, frame: &TrackedFrame) -> Result<&[u8], EncodeError> {
        self.release_tracks(&frame.lost);
        self.process_frame(frame.meta.clone(), &frame.objects)
    }

    /// Forget tracks the tracker reported lost.
    pub fn release_tracks(&mut self, track_ids: &[u64]) {
        for &track_id in track_ids {
            self.builder.clear_track(track_id);
        }
    }

    /// Record built by the last call to [`process_frame`](Self::process_frame).
    pub fn last_record(&self) -> &FrameRecord {
        &self.record
    }

    /// Encoding of [`last_record`](Self::last_record).
    pub fn last_encoded(&self) -> &[u8] {
        self.codec.last_encoded()
    }

    pub fn builder(&self) -> &FrameRecordBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut FrameRecordBuilder {
        &mut self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn frame(frame_number: u32, y: f32, lost: Vec<u64>) -> TrackedFrame {
        TrackedFrame {
            meta: FrameMeta {
                frame_number,
                timestamp: f64::from(frame_number) / 5.0,
                source_id: "lane-1".to_string(),
                ..Default::default()
            },
            objects: vec![DetectedObject::new(4, Rect::new(0.0, y, 20.0, 10.0), 5, 0.8)],
            lost,
        }
    }

    fn pipeline() -> MetadataPipeline {
        let config = EngineConfig {
            frame_rate: 5.0,
            ..Default::default()
        };
        MetadataPipeline::from_config(&config).unwrap()
    }

    #[test]
    fn test_process_frame_encodes_record() {
        let mut pipeline = pipeline();
        let bytes = pipeline.process(&frame(0, 10.0, vec![])).unwrap().to_vec();
        let view = MetadataCodec::decode(&bytes).unwrap();
        assert_eq!(view.source_id(), "lane-1");
        assert_eq!(view.object(0).unwrap().class_name(), "bus");
        assert_eq!(view.to_record(), *pipeline.last_record());
        assert_eq!(pipeline.last_encoded(), &bytes[..]);
    }

    #[test]
    fn test_speed_after_full_window() {
        let mut pipeline = pipeline();
        for n in 0..4 {
            pipeline.process(&frame(n, 10.0 + n as f32, vec![])).unwrap();
            assert_eq!(pipeline.last_record().objects[0].speed, None);
        }
        let bytes = pipeline.process(&frame(4, 14.0, vec![])).unwrap();
        let view = MetadataCodec::decode(bytes).unwrap();
        // 4 units in 0.8 s.
        let speed = view.object(0).unwrap().speed().unwrap();
        assert!((speed - 18.0).abs() < 1e-3, "{speed}");
    }

    #[test]
    fn test_lost_tracks_are_released_first() {
        let mut pipeline = pipeline();
        for n in 0..5 {
            pipeline.process(&frame(n, 10.0 + n as f32, vec![])).unwrap();
        }
        assert!(pipeline.last_record().objects[0].speed.is_some());

        pipeline.process(&frame(5, 15.0, vec![4])).unwrap();
        assert_eq!(pipeline.last_record().objects[0].speed, None);
        assert_eq!(pipeline.builder().estimator().samples_seen(4), Some(1));
    }
}
