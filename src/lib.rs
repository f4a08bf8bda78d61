//! Sensor-Capture: a capture-session driver for image sensors
//!
//! [`Camera`] opens one sensor, configures a single output stream and a single
//! capture request, and then runs either repeating or one-shot capture. Each
//! completion event feeds the sensor's reported exposure back into the
//! request, and frames are read out as packed BGR [`Image`]s.
//!
//! Hardware sits behind the traits in [`traits`]; [`device`] implements them
//! on V4L2 and the test suite drives the same code through a mock backend.

pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod exposure;
pub mod frame;
pub mod request;
pub mod sensor_mode;
pub mod stream;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use camera::Camera;
pub use config::CameraConfig;
pub use device::V4L2Provider;
pub use error::{CameraError, Result};
pub use exposure::{AdaptOutcome, ExposureFeedback};
pub use frame::{Image, ReadOutcome};
pub use sensor_mode::{BestMatch, FixedIndex, SensorModePolicy, SensorModeSelector};
pub use traits::{CameraProvider, CaptureSession, Range, SensorDevice, SensorMode, Size};
