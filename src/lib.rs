pub mod board;
pub mod calibration;
pub mod camera_model;
pub mod data_loader;
pub mod detected_points;
pub mod detector;
pub mod error;
pub mod io;
pub mod optimization;
pub mod pipeline;
pub mod selection;
pub mod synthetic;
pub mod types;
pub mod util;
pub mod visualization;

pub use board::{ObjectPointSet, TargetGeometry, build_object_points};
pub use calibration::{CalibrationFlags, CalibrationOptions, CalibrationResult, calibrate};
pub use camera_model::DistortionModel;
pub use detected_points::ImagePointSet;
pub use detector::{DetectorOptions, detect};
pub use error::{CalibError, Result};
pub use types::{CameraPose, resolve_pose};
