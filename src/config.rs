//! Camera construction parameters.

use std::time::Duration;

use crate::error::{CameraError, Result};
use crate::exposure::ExposureFeedback;
use crate::sensor_mode::SensorModePolicy;
use crate::traits::{PixelFormat, Size, StreamSettings};

const ONE_SECOND_NS: u64 = 1_000_000_000;

/// Default frame rate the request locks to.
pub const DEFAULT_FPS: u32 = 30;

/// Everything a [`Camera`](crate::Camera) needs at construction.
///
/// Built with [`CameraConfig::new`] and the chained setters; nothing is
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Index into the provider's device list.
    pub device_index: usize,
    /// Output resolution.
    pub resolution: Size,
    /// Attach capture metadata to events and frames.
    pub enable_metadata: bool,
    /// Locked frame rate.
    pub fps: u32,
    /// Output stream pixel format.
    pub pixel_format: PixelFormat,
    /// How the sensor mode is chosen.
    pub sensor_mode: SensorModePolicy,
    /// Bound on each completion-event wait. `None` blocks.
    pub event_timeout: Option<Duration>,
    /// Bound on waiting for the stream to connect. `None` blocks.
    pub connect_timeout: Option<Duration>,
    /// Exposure feedback constants.
    pub exposure: ExposureFeedback,
}

impl CameraConfig {
    /// Configuration for `width`x`height` output from device `device_index`.
    #[must_use]
    pub fn new(device_index: usize, width: u32, height: u32, enable_metadata: bool) -> Self {
        Self {
            device_index,
            resolution: Size::new(width, height),
            enable_metadata,
            fps: DEFAULT_FPS,
            pixel_format: PixelFormat::default(),
            sensor_mode: SensorModePolicy::default(),
            event_timeout: None,
            connect_timeout: None,
            exposure: ExposureFeedback::default(),
        }
    }

    /// Set the locked frame rate.
    #[must_use]
    pub const fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the output pixel format.
    #[must_use]
    pub const fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set the sensor mode policy.
    #[must_use]
    pub const fn sensor_mode(mut self, policy: SensorModePolicy) -> Self {
        self.sensor_mode = policy;
        self
    }

    /// Bound completion-event waits.
    #[must_use]
    pub const fn event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = Some(timeout);
        self
    }

    /// Bound stream connection waits.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Replace the exposure feedback constants.
    #[must_use]
    pub const fn exposure_feedback(mut self, exposure: ExposureFeedback) -> Self {
        self.exposure = exposure;
        self
    }

    /// Frame period at the configured frame rate.
    #[must_use]
    pub fn frame_duration_ns(&self) -> u64 {
        ONE_SECOND_NS / u64::from(self.fps.max(1))
    }

    /// Output stream settings derived from this configuration.
    #[must_use]
    pub const fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            pixel_format: self.pixel_format,
            resolution: self.resolution,
            metadata_enabled: self.enable_metadata,
        }
    }

    /// Reject values no device can satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(CameraError::Configuration(format!(
                "unsupported resolution {}x{}",
                self.resolution.width, self.resolution.height
            )));
        }
        if self.fps == 0 {
            return Err(CameraError::Configuration(
                "frame rate must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}
