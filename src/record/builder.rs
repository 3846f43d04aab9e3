//! Turns one frame of tracker output into a `FrameRecord`.

use tracing::{trace, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::record::{ClassTable, DetectedObject, FrameMeta, FrameRecord, ObjectRecord};
use crate::speed::{Measurement, SpeedEstimator, SpeedGate};
use crate::text::SequenceDecoder;

/// Default overspeed threshold, in reporting units.
pub const DEFAULT_SPEED_LIMIT: f32 = 60.0;

/// Filters objects by class, estimates speed, decodes text and flags
/// overspeed objects.
///
/// Holds per-track state, so one builder serves exactly one video source.
#[derive(Debug, Clone)]
pub struct FrameRecordBuilder {
    classes: ClassTable,
    estimator: SpeedEstimator,
    decoder: SequenceDecoder,
    gate: Option<SpeedGate>,
    speed_limit: f32,
    text_component: Option<i32>,
}

impl FrameRecordBuilder {
    pub fn new(estimator: SpeedEstimator, decoder: SequenceDecoder, classes: ClassTable) -> Self {
        Self {
            classes,
            estimator,
            decoder,
            gate: None,
            speed_limit: DEFAULT_SPEED_LIMIT,
            text_component: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let gate = config
            .validation
            .clone()
            .map(|v| SpeedGate::new(v, config.track_capacity))
            .transpose()?;

        Ok(Self {
            classes: config.class_table()?,
            estimator: SpeedEstimator::from_config(config)?,
            decoder: SequenceDecoder::new(config.alphabet()?),
            gate,
            speed_limit: config.speed_limit,
            text_component: config.text_component_id,
        })
    }

    pub fn with_speed_limit(mut self, speed_limit: f32) -> Self {
        self.speed_limit = speed_limit;
        self
    }

    pub fn with_gate(mut self, gate: SpeedGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_text_component(mut self, component_id: Option<i32>) -> Self {
        self.text_component = component_id;
        self
    }

    pub fn estimator(&self) -> &SpeedEstimator {
        &self.estimator
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn speed_limit(&self) -> f32 {
        self.speed_limit
    }

    /// Build the record for one frame.
    ///
    /// Objects outside the class table or with a degenerate box are left out;
    /// the rest keep their input order.
    pub fn build(&mut self, meta: FrameMeta, objects: &[DetectedObject]) -> FrameRecord {
        let timestamp = meta.timestamp;
        let records = objects
            .iter()
            .filter_map(|obj| self.build_object(obj, timestamp))
            .collect();
        FrameRecord::from_meta(meta, records)
    }

    /// Drop all state for a track the tracker reported lost.
    pub fn clear_track(&mut self, track_id: u64) {
        self.estimator.clear(track_id);
        if let Some(gate) = &mut self.gate {
            gate.clear(track_id);
        }
    }

    fn build_object(&mut self, obj: &DetectedObject, timestamp: f64) -> Option<ObjectRecord> {
        let Some(class_name) = self.classes.name(obj.class_id) else {
            trace!(track_id = obj.track_id, class_id = obj.class_id, "class not retained");
            return None;
        };
        if obj.bbox.is_degenerate() || !obj.confidence.is_finite() {
            warn!(
                track_id = obj.track_id,
                bbox = ?obj.bbox,
                confidence = obj.confidence,
                "skipping malformed object"
            );
            return None;
        }
        let class_name = class_name.to_string();

        let (cx, bottom) = obj.bbox.bottom_center();
        let seen_before = self.estimator.samples_seen(obj.track_id);
        let raw = self
            .estimator
            .update(obj.track_id, (f64::from(cx), f64::from(bottom)));
        let seen = self.estimator.samples_seen(obj.track_id);
        let speed = match &mut self.gate {
            // No sample was recorded (horizon point): leave the gate untouched.
            Some(_) if seen == seen_before => None,
            Some(gate) => {
                // Fresh history, either new or reclaimed by the estimator.
                if seen == Some(1) {
                    gate.clear(obj.track_id);
                }
                let measurement = Measurement {
                    raw,
                    age: seen.map_or(0, |n| n.saturating_sub(1)),
                    displacement: self.estimator.displacement(obj.track_id),
                    area: obj.bbox.area(),
                    confidence: obj.confidence,
                };
                gate.filter(obj.track_id, measurement)
            }
            None => raw,
        };

        let decoded = self
            .decoder
            .resolve(&obj.classifiers, self.text_component)
            .unwrap_or_default();

        Some(ObjectRecord {
            track_id: obj.track_id,
            bbox: obj.bbox,
            class_id: obj.class_id,
            class_name,
            confidence: obj.confidence,
            speed,
            text: decoded.text,
            text_confidence: decoded.confidence,
            timestamp,
            is_overspeed: speed.is_some_and(|s| s > self.speed_limit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Homography, Rect};
    use crate::record::ClassifierOutput;
    use crate::text::Alphabet;

    fn builder(frame_rate: f64) -> FrameRecordBuilder {
        let estimator = SpeedEstimator::new(Homography::identity(), frame_rate, 64).unwrap();
        FrameRecordBuilder::new(estimator, SequenceDecoder::default(), ClassTable::vehicles())
    }

    fn meta(frame_number: u32) -> FrameMeta {
        FrameMeta {
            frame_number,
            timestamp: frame_number as f64 / 25.0,
            source_id: "cam-0".to_string(),
            width: 1920,
            height: 1080,
            ..Default::default()
        }
    }

    fn car(track_id: u64, class_id: i32, bottom: f32) -> DetectedObject {
        DetectedObject::new(
            track_id,
            Rect::new(100.0, bottom - 50.0, 80.0, 50.0),
            class_id,
            0.9,
        )
    }

    #[test]
    fn test_class_filter_keeps_order() {
        let mut builder = builder(25.0);
        let objects = [car(1, 2, 300.0), car(2, 9, 300.0), car(3, 3, 300.0)];
        let record = builder.build(meta(0), &objects);

        assert_eq!(record.objects.len(), 2);
        assert_eq!(record.objects[0].track_id, 1);
        assert_eq!(record.objects[0].class_name, "car");
        assert_eq!(record.objects[1].track_id, 3);
        assert_eq!(record.objects[1].class_name, "motorcycle");
        assert_eq!(record.source_id, "cam-0");
    }

    #[test]
    fn test_degenerate_box_skipped() {
        let mut builder = builder(25.0);
        let mut flat = car(2, 2, 300.0);
        flat.bbox.height = 0.0;
        let record = builder.build(meta(0), &[car(1, 2, 300.0), flat, car(3, 7, 300.0)]);
        let ids: Vec<u64> = record.objects.iter().map(|o| o.track_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(builder.estimator().track_count(), 2);
    }

    #[test]
    fn test_speed_and_overspeed() {
        // 5 fps window; ground point moves 5 units per frame = 25 u/s = 90 km/h.
        let mut builder = builder(5.0);
        let mut last = None;
        for frame in 0..5u32 {
            let record = builder.build(meta(frame), &[car(1, 2, 100.0 + 5.0 * frame as f32)]);
            last = Some(record);
        }
        let record = last.unwrap();
        let obj = &record.objects[0];
        assert!((obj.speed.unwrap() - 90.0).abs() < 1e-3);
        assert!(obj.is_overspeed);
        assert_eq!(record.overspeed_count(), 1);
    }

    #[test]
    fn test_limit_is_strict() {
        let run = |builder: &mut FrameRecordBuilder| {
            let mut record = FrameRecord::default();
            for frame in 0..5u32 {
                record = builder.build(meta(frame), &[car(1, 2, 100.0 + 5.0 * frame as f32)]);
            }
            record.objects[0].clone()
        };
        let measured = run(&mut builder(5.0)).speed.unwrap();
        let at_limit = run(&mut builder(5.0).with_speed_limit(measured));
        assert_eq!(at_limit.speed, Some(measured));
        assert!(!at_limit.is_overspeed);
    }

    #[test]
    fn test_new_track_has_no_speed() {
        let mut builder = builder(25.0);
        let record = builder.build(meta(0), &[car(1, 2, 300.0)]);
        assert_eq!(record.objects[0].speed, None);
        assert!(!record.objects[0].is_overspeed);
    }

    #[test]
    fn test_no_classifier_means_no_text() {
        let mut builder = builder(25.0);
        let record = builder.build(meta(0), &[car(1, 2, 300.0)]);
        assert_eq!(record.objects[0].text, "");
        assert_eq!(record.objects[0].text_confidence, 0.0);
    }

    #[test]
    fn test_text_from_label_and_component_filter() {
        let mut builder = builder(25.0).with_text_component(Some(2));
        let obj = car(1, 2, 300.0)
            .with_classifier(ClassifierOutput::label(1, "COLOR-RED", 0.99))
            .with_classifier(ClassifierOutput::label(2, "51F12345", 0.8));
        let record = builder.build(meta(0), &[obj]);
        assert_eq!(record.objects[0].text, "51F12345");
        assert_eq!(record.objects[0].text_confidence, 0.8);
    }

    #[test]
    fn test_text_from_probabilities() {
        let decoder = SequenceDecoder::new(Alphabet::new("AB").unwrap());
        let estimator = SpeedEstimator::new(Homography::identity(), 25.0, 8).unwrap();
        let mut builder = FrameRecordBuilder::new(estimator, decoder, ClassTable::vehicles());

        let probs = ndarray::array![[0.9, 0.05, 0.05], [0.1, 0.1, 0.8], [0.2, 0.7, 0.1]];
        let obj = car(1, 2, 300.0).with_classifier(ClassifierOutput::probabilities(2, probs));
        let record = builder.build(meta(0), &[obj]);
        assert_eq!(record.objects[0].text, "AB");
        assert!((record.objects[0].text_confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_clear_track_restarts_window() {
        let mut builder = builder(5.0);
        for frame in 0..5u32 {
            builder.build(meta(frame), &[car(1, 2, 100.0 + frame as f32)]);
        }
        builder.clear_track(1);
        let record = builder.build(meta(5), &[car(1, 2, 200.0)]);
        assert_eq!(record.objects[0].speed, None);
        assert_eq!(builder.estimator().samples_seen(1), Some(1));
    }

    #[test]
    fn test_gate_blocks_young_tracks() {
        let gate = SpeedGate::new(
            crate::config::ValidationConfig {
                min_track_age: 8,
                ..Default::default()
            },
            16,
        )
        .unwrap();
        let mut builder = builder(5.0).with_gate(gate);
        let speeds: Vec<Option<f32>> = (0..10u32)
            .map(|frame| {
                let record = builder.build(meta(frame), &[car(1, 2, 100.0 + 5.0 * frame as f32)]);
                record.objects[0].speed
            })
            .collect();
        assert!(speeds[..8].iter().all(Option::is_none));
        assert!((speeds[8].unwrap() - 90.0).abs() < 1e-3);
        assert!((speeds[9].unwrap() - 90.0).abs() < 1e-3);
    }

    fn lenient_gate() -> SpeedGate {
        SpeedGate::new(
            crate::config::ValidationConfig {
                min_track_age: 0,
                ..Default::default()
            },
            16,
        )
        .unwrap()
    }

    #[test]
    fn test_reclaimed_track_restarts_gate_history() {
        // Two-sample window, room for a single track in the estimator.
        let estimator = SpeedEstimator::new(Homography::identity(), 2.0, 1).unwrap();
        let mut builder =
            FrameRecordBuilder::new(estimator, SequenceDecoder::default(), ClassTable::vehicles())
                .with_gate(lenient_gate());

        // 10 units per half second: 72 km/h, accepted three times.
        for (frame, bottom) in [100.0, 110.0, 120.0, 130.0].into_iter().enumerate() {
            builder.build(meta(frame as u32), &[car(1, 2, bottom)]);
        }
        // Track 2 takes the only estimator slot.
        builder.build(meta(4), &[car(2, 2, 300.0)]);

        builder.build(meta(5), &[car(1, 2, 500.0)]);
        let record = builder.build(meta(6), &[car(1, 2, 501.0)]);
        let speed = record.objects[0].speed.unwrap();
        assert!((speed - 7.2).abs() < 1e-3, "{speed}");
    }

    #[test]
    fn test_horizon_point_skips_gate() {
        // Image rows at y = -100 map to the horizon.
        let h = Homography::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.01, 1.0]]).unwrap();
        let estimator = SpeedEstimator::new(h, 2.0, 16).unwrap();
        let mut builder =
            FrameRecordBuilder::new(estimator, SequenceDecoder::default(), ClassTable::vehicles())
                .with_gate(lenient_gate());

        let record = builder.build(meta(0), &[car(1, 2, -100.0)]);
        assert_eq!(record.objects.len(), 1);
        assert_eq!(record.objects[0].speed, None);
        assert_eq!(builder.estimator().samples_seen(1), None);
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig {
            speed_limit: 50.0,
            frame_rate: 10.0,
            ..Default::default()
        };
        let builder = FrameRecordBuilder::from_config(&config).unwrap();
        assert_eq!(builder.speed_limit(), 50.0);
        assert_eq!(builder.estimator().window_size(), 10);
        assert_eq!(builder.classes().len(), 4);
    }
}
