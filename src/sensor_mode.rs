//! Sensor mode selection policies.

use crate::config::CameraConfig;
use crate::traits::SensorMode;

/// Mode index chosen for the reference sensor (1280x720 class at 30 fps).
pub const REFERENCE_MODE_INDEX: usize = 2;

/// Picks one sensor mode from a device's advertised list.
pub trait SensorModeSelector {
    /// Choose a mode for `config`, or `None` if nothing fits.
    fn select<'m>(&self, modes: &'m [SensorMode], config: &CameraConfig)
        -> Option<&'m SensorMode>;
}

/// Always the mode at a fixed position in the device's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedIndex(pub usize);

impl SensorModeSelector for FixedIndex {
    fn select<'m>(&self, modes: &'m [SensorMode], _config: &CameraConfig) -> Option<&'m SensorMode> {
        modes.get(self.0)
    }
}

/// The smallest mode that covers the output resolution and can run at the
/// configured frame rate.
///
/// Modes that do not advertise a frame-duration range are assumed to support
/// any rate. Ties keep the earlier mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestMatch;

impl SensorModeSelector for BestMatch {
    fn select<'m>(&self, modes: &'m [SensorMode], config: &CameraConfig) -> Option<&'m SensorMode> {
        let frame_duration = config.frame_duration_ns();
        modes
            .iter()
            .filter(|mode| mode.resolution.covers(config.resolution))
            .filter(|mode| {
                mode.frame_duration_range
                    .map_or(true, |range| range.contains(frame_duration))
            })
            .min_by_key(|mode| mode.resolution.area())
    }
}

/// Policy stored in [`CameraConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorModePolicy {
    /// See [`FixedIndex`].
    Fixed(usize),
    /// See [`BestMatch`].
    BestMatch,
}

impl Default for SensorModePolicy {
    fn default() -> Self {
        Self::Fixed(REFERENCE_MODE_INDEX)
    }
}

impl SensorModeSelector for SensorModePolicy {
    fn select<'m>(&self, modes: &'m [SensorMode], config: &CameraConfig) -> Option<&'m SensorMode> {
        match *self {
            Self::Fixed(index) => FixedIndex(index).select(modes, config),
            Self::BestMatch => BestMatch.select(modes, config),
        }
    }
}
