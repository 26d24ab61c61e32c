//! Grading: per-trial composite scoring and judge calibration.

pub mod calibration;
pub mod composite;

pub use calibration::{calibrate_judge, CalibrationError, CalibrationResult};
pub use composite::{grade_composite, CompositeConfig, CompositeError};
