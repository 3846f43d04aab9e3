//! Windowed per-track speed estimation on the world plane.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::config::{ConfigError, EngineConfig, check_frame_rate, check_track_capacity};
use crate::geometry::Homography;
use crate::speed::TrackArena;

/// Lower plausibility bound for a reported speed.
pub const MIN_SPEED: f32 = 0.0;
/// Upper plausibility bound for a reported speed.
pub const MAX_SPEED: f32 = 200.0;
/// World units per second to reporting units (m/s to km/h).
pub const MS_TO_KMH: f64 = 3.6;

/// One world-plane observation of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub world_y: f64,
    /// Per-track sequence number, starting at 0
    pub seq: u64,
}

#[derive(Debug, Clone)]
struct TrackHistory {
    samples: VecDeque<Sample>,
    seen: u64,
}

impl TrackHistory {
    fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            seen: 0,
        }
    }

    fn push(&mut self, world_y: f64, window: usize) {
        self.samples.push_back(Sample {
            world_y,
            seq: self.seen,
        });
        self.seen += 1;
        while self.samples.len() > window {
            self.samples.pop_front();
        }
    }

    fn displacement(&self) -> Option<f64> {
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        Some((last.world_y - first.world_y).abs())
    }
}

/// Estimates object speed from the last second of ground-point positions.
///
/// Each track keeps the world-y of its last `window` samples, where `window`
/// is the frame rate rounded to whole frames. A speed is only produced once
/// the window is full, and anything outside `[MIN_SPEED, MAX_SPEED]` is
/// treated as noise.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    projector: Homography,
    frame_rate: f64,
    window: usize,
    tracks: TrackArena<TrackHistory>,
}

impl SpeedEstimator {
    pub fn new(
        projector: Homography,
        frame_rate: f64,
        track_capacity: usize,
    ) -> Result<Self, ConfigError> {
        check_frame_rate(frame_rate)?;
        check_track_capacity(track_capacity)?;
        Ok(Self {
            projector,
            frame_rate,
            window: frame_rate.round() as usize,
            tracks: TrackArena::new(track_capacity),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.homography()?,
            config.frame_rate,
            config.track_capacity,
        )
    }

    pub fn projector(&self) -> &Homography {
        &self.projector
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn window_size(&self) -> usize {
        self.window
    }

    /// Number of tracks currently holding history.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Record the image-plane ground point of a track and return its speed.
    ///
    /// `None` means no speed yet (window not full), an implausible value, or
    /// a point on the horizon line; the latter is not recorded.
    pub fn update(&mut self, track_id: u64, image_point: (f64, f64)) -> Option<f32> {
        let world = self.projector.project(image_point.0, image_point.1)?;
        let window = self.window;

        let history = self.tracks.get_or_insert_with(track_id, || {
            debug!(track_id, "tracking new object");
            TrackHistory::new()
        });
        history.push(world.y, window);

        let speed = estimate(history, self.frame_rate, window);
        trace!(track_id, world_y = world.y, ?speed, "speed update");
        speed
    }

    /// Forget a track. Unknown ids are ignored.
    pub fn clear(&mut self, track_id: u64) {
        if self.tracks.remove(track_id).is_some() {
            debug!(track_id, "cleared track history");
        }
    }

    /// Samples observed for a track since it was (re)created.
    pub fn samples_seen(&self, track_id: u64) -> Option<u64> {
        self.tracks.get(track_id).map(|h| h.seen)
    }

    /// Absolute world-y change between the oldest and newest sample in the
    /// window.
    pub fn displacement(&self, track_id: u64) -> Option<f64> {
        self.tracks.get(track_id).and_then(TrackHistory::displacement)
    }

    /// Current window contents for a track, oldest first.
    pub fn samples(&self, track_id: u64) -> Option<impl Iterator<Item = &Sample>> {
        self.tracks.get(track_id).map(|h| h.samples.iter())
    }
}

fn estimate(history: &TrackHistory, frame_rate: f64, window: usize) -> Option<f32> {
    let len = history.samples.len();
    if len < window {
        return None;
    }

    let distance = history.displacement()?;
    let elapsed = (len - 1) as f64 / frame_rate;
    if elapsed <= 0.0 {
        return None;
    }

    let speed = (distance / elapsed * MS_TO_KMH) as f32;
    (speed.is_finite() && (MIN_SPEED..=MAX_SPEED).contains(&speed)).then_some(speed)
}
