mod arena;
mod estimator;
mod gate;

pub use arena::TrackArena;
pub use estimator::{MAX_SPEED, MIN_SPEED, MS_TO_KMH, Sample, SpeedEstimator};
pub use gate::{Measurement, SpeedGate};
