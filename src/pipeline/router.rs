//! Shards pipelines by source id.

use std::collections::HashMap;

use tracing::debug;

use crate::codec::EncodeError;
use crate::config::{ConfigError, EngineConfig};
use crate::pipeline::{FrameSource, MetadataPipeline, TrackedFrame};
use crate::record::{DetectedObject, FrameMeta};

/// One [`MetadataPipeline`] per source id, created on first sight.
///
/// Every pipeline starts from the same validated configuration. Sources never
/// share mutable state, so distinct routers (or distinct sources moved into
/// their own pipelines) can run in parallel.
#[derive(Debug, Clone)]
pub struct SourceRouter {
    template: MetadataPipeline,
    pipelines: HashMap<String, MetadataPipeline>,
}

impl SourceRouter {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            template: MetadataPipeline::from_config(config)?,
            pipelines: HashMap::new(),
        })
    }

    /// Build and encode a frame on the pipeline of `meta.source_id`.
    pub fn process_frame(
        &mut self,
        meta: FrameMeta,
        objects: &[DetectedObject],
    ) -> Result<&[u8], EncodeError> {
        let pipeline = self.pipeline_mut(&meta.source_id);
        pipeline.process_frame(meta, objects)
    }

    /// Release lost tracks and process the frame on its source's pipeline.
    pub fn process(&mut self, frame: &TrackedFrame) -> Result<&[u8], EncodeError> {
        self.pipeline_mut(&frame.meta.source_id).process(frame)
    }

    /// Forward track-lost notifications to one source. Unknown sources are
    /// ignored.
    pub fn release_tracks(&mut self, source_id: &str, track_ids: &[u64]) {
        if let Some(pipeline) = self.pipelines.get_mut(source_id) {
            pipeline.release_tracks(track_ids);
        }
    }

    /// Drop a source and all of its track state.
    pub fn remove_source(&mut self, source_id: &str) -> bool {
        let removed = self.pipelines.remove(source_id).is_some();
        if removed {
            debug!(source_id, "removed source");
        }
        removed
    }

    pub fn pipeline(&self, source_id: &str) -> Option<&MetadataPipeline> {
        self.pipelines.get(source_id)
    }

    pub fn source_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Feed every frame of `source` through the router, handing each encoded
    /// frame to `sink`.
    ///
    /// # Returns
    /// The number of frames processed.
    pub fn drain<S, F, E>(&mut self, mut source: S, mut sink: F) -> Result<usize, E>
    where
        S: FrameSource,
        E: From<S::Error> + From<EncodeError>,
        F: FnMut(&TrackedFrame, &[u8]) -> Result<(), E>,
    {
        let mut count = 0;
        while let Some(frame) = source.next_frame()? {
            let bytes = self.process(&frame)?;
            sink(&frame, bytes)?;
            count += 1;
        }
        Ok(count)
    }

    fn pipeline_mut(&mut self, source_id: &str) -> &mut MetadataPipeline {
        let template = &self.template;
        self.pipelines
            .entry(source_id.to_owned())
            .or_insert_with(|| {
                debug!(source_id, "creating pipeline for new source");
                template.clone()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MetadataCodec;
    use crate::geometry::Rect;

    fn config() -> EngineConfig {
        EngineConfig {
            frame_rate: 5.0,
            ..Default::default()
        }
    }

    fn meta(source_id: &str, frame_number: u32) -> FrameMeta {
        FrameMeta {
            frame_number,
            source_id: source_id.to_string(),
            ..Default::default()
        }
    }

    fn car(track_id: u64, y: f32) -> DetectedObject {
        DetectedObject::new(track_id, Rect::new(0.0, y, 10.0, 10.0), 2, 0.9)
    }

    #[test]
    fn test_sources_are_isolated() {
        let mut router = SourceRouter::new(&config()).unwrap();
        // Same track id on two cameras, different motion.
        for n in 0..5u32 {
            router
                .process_frame(meta("a", n), &[car(1, n as f32 * 2.0)])
                .unwrap();
            router.process_frame(meta("b", n), &[car(1, 50.0)]).unwrap();
        }
        assert_eq!(router.source_count(), 2);

        let a = router.pipeline("a").unwrap().last_record().objects[0].speed.unwrap();
        let b = router.pipeline("b").unwrap().last_record().objects[0].speed.unwrap();
        assert!((a - 36.0).abs() < 1e-3, "{a}");
        assert!(b.abs() < 1e-6);
    }

    #[test]
    fn test_release_tracks_targets_one_source() {
        let mut router = SourceRouter::new(&config()).unwrap();
        for n in 0..5u32 {
            router.process_frame(meta("a", n), &[car(1, 0.0)]).unwrap();
            router.process_frame(meta("b", n), &[car(1, 0.0)]).unwrap();
        }
        router.release_tracks("a", &[1]);
        router.release_tracks("missing", &[1]);

        let a = router.pipeline("a").unwrap().builder().estimator();
        let b = router.pipeline("b").unwrap().builder().estimator();
        assert_eq!(a.samples_seen(1), None);
        assert_eq!(b.samples_seen(1), Some(5));
    }

    #[test]
    fn test_remove_source() {
        let mut router = SourceRouter::new(&config()).unwrap();
        router.process_frame(meta("a", 0), &[]).unwrap();
        assert!(router.remove_source("a"));
        assert!(!router.remove_source("a"));
        assert_eq!(router.source_count(), 0);
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn test_pipelines_can_move_across_threads() {
        assert_send::<MetadataPipeline>();
        assert_send::<SourceRouter>();

        let mut router = SourceRouter::new(&config()).unwrap();
        router.process_frame(meta("a", 0), &[car(1, 0.0)]).unwrap();
        let handle = std::thread::spawn(move || {
            router.process_frame(meta("a", 1), &[car(1, 1.0)]).unwrap();
            router.source_count()
        });
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = EngineConfig {
            frame_rate: 0.0,
            ..Default::default()
        };
        assert!(SourceRouter::new(&config).is_err());
    }

    #[derive(Debug)]
    enum TestError {
        Encode,
    }

    impl From<EncodeError> for TestError {
        fn from(_: EncodeError) -> Self {
            TestError::Encode
        }
    }

    impl From<std::convert::Infallible> for TestError {
        fn from(e: std::convert::Infallible) -> Self {
            match e {}
        }
    }

    struct VecSource(std::vec::IntoIter<TrackedFrame>);

    impl FrameSource for VecSource {
        type Error = std::convert::Infallible;

        fn next_frame(&mut self) -> Result<Option<TrackedFrame>, Self::Error> {
            Ok(self.0.next())
        }
    }

    #[test]
    fn test_drain() {
        let frames: Vec<TrackedFrame> = (0..3u32)
            .map(|n| TrackedFrame {
                meta: meta(if n % 2 == 0 { "a" } else { "b" }, n),
                objects: vec![car(7, 0.0)],
                lost: Vec::new(),
            })
            .collect();
        let mut router = SourceRouter::new(&config()).unwrap();
        let mut seen = Vec::new();
        let count = router
            .drain(VecSource(frames.into_iter()), |frame, bytes| {
                let view = MetadataCodec::decode(bytes).map_err(|_| TestError::Encode)?;
                assert_eq!(view.frame_number(), frame.meta.frame_number);
                seen.push(view.source_id().to_string());
                Ok::<_, TestError>(())
            })
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(seen, vec!["a", "b", "a"]);
        assert_eq!(router.source_count(), 2);
    }
}
