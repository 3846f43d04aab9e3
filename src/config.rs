//! Engine configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Homography;
use crate::record::ClassTable;
use crate::text::Alphabet;

/// Highest accepted frame rate. The speed window holds one second of samples.
pub const MAX_FRAME_RATE: f64 = 1000.0;
/// Highest accepted number of tracks held per source.
pub const MAX_TRACK_CAPACITY: usize = 1 << 20;

/// Errors detected while constructing the engine. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("frame rate must lie in [0.5, 1000] fps, got {0}")]
    InvalidFrameRate(f64),
    #[error("homography needs 9 values, got {0}")]
    HomographyShape(usize),
    #[error("homography contains non-finite values")]
    NonFiniteHomography,
    #[error("homography is singular (determinant {determinant})")]
    SingularHomography { determinant: f64 },
    #[error("point correspondences do not define a homography")]
    DegenerateCorrespondences,
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
    #[error("invalid class table: {0}")]
    InvalidClassTable(String),
    #[error("speed limit must be finite and non-negative, got {0}")]
    InvalidSpeedLimit(f32),
    #[error("track capacity must lie in [1, 1048576], got {0}")]
    InvalidTrackCapacity(usize),
    #[error("invalid validation settings: {0}")]
    InvalidValidation(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How image points map onto the world plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionConfig {
    /// Row-major 3x3 matrix.
    Matrix([[f64; 3]; 3]),
    /// Four image points and the world points they land on.
    Correspondences {
        source: [[f64; 2]; 4],
        target: [[f64; 2]; 4],
    },
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self::Matrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }
}

impl ProjectionConfig {
    pub fn build(&self) -> Result<Homography, ConfigError> {
        match self {
            Self::Matrix(rows) => Homography::new(*rows),
            Self::Correspondences { source, target } => {
                Homography::from_correspondences(source, target)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: i32,
    pub name: String,
}

/// Optional plausibility gate applied to raw speed estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Samples a track must have been seen for before a speed is reported
    pub min_track_age: u32,
    /// Minimum world-plane displacement across the window
    pub min_world_displacement: f64,
    /// Upper plausibility bound, in reporting units
    pub max_speed: f32,
    /// Largest accepted bbox area growth between consecutive frames
    pub max_area_jump: f32,
    /// Minimum detection confidence
    pub min_confidence: f32,
    /// Number of accepted estimates kept for median smoothing
    pub median_window: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_track_age: 12,
            min_world_displacement: 0.5,
            max_speed: 160.0,
            max_area_jump: 2.5,
            min_confidence: 0.45,
            median_window: 5,
        }
    }
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.median_window == 0 {
            return Err(ConfigError::InvalidValidation("median_window must be non-zero"));
        }
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            return Err(ConfigError::InvalidValidation("max_speed must be positive"));
        }
        if !self.max_area_jump.is_finite() || self.max_area_jump < 1.0 {
            return Err(ConfigError::InvalidValidation("max_area_jump must be at least 1"));
        }
        if !self.min_world_displacement.is_finite() || self.min_world_displacement < 0.0 {
            return Err(ConfigError::InvalidValidation(
                "min_world_displacement must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Everything needed to build a metadata pipeline for one video source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub projection: ProjectionConfig,
    /// Frames per second; the speed window holds `round(frame_rate)` samples
    pub frame_rate: f64,
    /// Objects faster than this are flagged overspeed
    pub speed_limit: f32,
    /// Allow-list of class ids with their names
    pub classes: Vec<ClassEntry>,
    /// Decode symbols, without the trailing blank
    pub alphabet: String,
    /// Only read text from classifier outputs with this component id
    pub text_component_id: Option<i32>,
    /// Maximum number of tracks held at once per source
    pub track_capacity: usize,
    pub validation: Option<ValidationConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::default(),
            frame_rate: 25.0,
            speed_limit: 60.0,
            classes: [(2, "car"), (3, "motorcycle"), (5, "bus"), (7, "truck")]
                .into_iter()
                .map(|(id, name)| ClassEntry {
                    id,
                    name: name.to_string(),
                })
                .collect(),
            alphabet: Alphabet::PLATE_SYMBOLS.to_string(),
            text_component_id: None,
            track_capacity: 1024,
            validation: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Number of samples in the speed window.
    ///
    /// Only meaningful once [`validate`](Self::validate) has passed.
    pub fn window_size(&self) -> usize {
        self.frame_rate.round() as usize
    }

    /// Run every construction-time check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_frame_rate(self.frame_rate)?;
        if !self.speed_limit.is_finite() || self.speed_limit < 0.0 {
            return Err(ConfigError::InvalidSpeedLimit(self.speed_limit));
        }
        check_track_capacity(self.track_capacity)?;
        self.projection.build()?;
        self.alphabet()?;
        self.class_table()?;
        if let Some(validation) = &self.validation {
            validation.validate()?;
        }
        Ok(())
    }

    pub fn homography(&self) -> Result<Homography, ConfigError> {
        self.projection.build()
    }

    pub fn alphabet(&self) -> Result<Alphabet, ConfigError> {
        Alphabet::new(&self.alphabet)
    }

    pub fn class_table(&self) -> Result<ClassTable, ConfigError> {
        ClassTable::new(self.classes.iter().map(|c| (c.id, c.name.as_str())))
    }
}

pub(crate) fn check_frame_rate(frame_rate: f64) -> Result<(), ConfigError> {
    if !frame_rate.is_finite() || frame_rate.round() < 1.0 || frame_rate > MAX_FRAME_RATE {
        return Err(ConfigError::InvalidFrameRate(frame_rate));
    }
    Ok(())
}

pub(crate) fn check_track_capacity(capacity: usize) -> Result<(), ConfigError> {
    if capacity == 0 || capacity > MAX_TRACK_CAPACITY {
        return Err(ConfigError::InvalidTrackCapacity(capacity));
    }
    Ok(())
}
