//! Plausibility checks and median smoothing on top of raw speed estimates.

use std::collections::VecDeque;

use tracing::trace;

use crate::config::{ConfigError, ValidationConfig, check_track_capacity};
use crate::speed::TrackArena;

/// Everything the gate looks at for one object in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Raw windowed estimate, if any
    pub raw: Option<f32>,
    /// Frames since the track was first seen
    pub age: u64,
    /// World displacement across the estimation window
    pub displacement: Option<f64>,
    /// Bounding box area in pixels
    pub area: f32,
    /// Detector confidence
    pub confidence: f32,
}

#[derive(Debug, Clone, Default)]
struct GateState {
    last_area: Option<f32>,
    accepted: VecDeque<f32>,
}

/// Rejects estimates from young tracks, near-stationary jitter, bbox jumps
/// (zoom or identity switches) and weak detections, then smooths the
/// survivors with a running median.
#[derive(Debug, Clone)]
pub struct SpeedGate {
    config: ValidationConfig,
    tracks: TrackArena<GateState>,
}

impl SpeedGate {
    pub fn new(config: ValidationConfig, track_capacity: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        check_track_capacity(track_capacity)?;
        Ok(Self {
            config,
            tracks: TrackArena::new(track_capacity),
        })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Return the smoothed speed, or `None` when the measurement is rejected.
    pub fn filter(&mut self, track_id: u64, m: Measurement) -> Option<f32> {
        let window = self.config.median_window;
        let state = self.tracks.get_or_insert_with(track_id, GateState::default);
        let prev_area = state.last_area.replace(m.area);

        let raw = m.raw?;
        if let Some(reason) = rejection(&self.config, &m, raw, prev_area) {
            trace!(track_id, raw, reason, "speed rejected");
            return None;
        }

        state.accepted.push_back(raw);
        while state.accepted.len() > window {
            state.accepted.pop_front();
        }

        if state.accepted.len() >= 3 {
            Some(median(&state.accepted))
        } else {
            Some(raw)
        }
    }

    pub fn clear(&mut self, track_id: u64) {
        self.tracks.remove(track_id);
    }
}

fn rejection(
    config: &ValidationConfig,
    m: &Measurement,
    raw: f32,
    prev_area: Option<f32>,
) -> Option<&'static str> {
    if m.age < u64::from(config.min_track_age) {
        return Some("track too young");
    }
    if m
        .displacement
        .is_some_and(|d| d < config.min_world_displacement)
    {
        return Some("displacement too small");
    }
    if raw <= 0.0 || raw > config.max_speed {
        return Some("outside plausible range");
    }
    if let Some(prev) = prev_area.filter(|&a| a > 0.0) {
        if m.area / prev > config.max_area_jump {
            return Some("bbox area jump");
        }
    }
    if m.confidence < config.min_confidence {
        return Some("low detection confidence");
    }
    None
}

fn median(values: &VecDeque<f32>) -> f32 {
    let mut sorted: Vec<f32> = values.iter().copied().collect();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
