//! Exposure feedback law.
//!
//! Each completion event reports the exposure the sensor actually used. The
//! next request is pinned to a zero-width range just below that value. This
//! tracks the sensor's own convergence; it is not a general auto-exposure
//! controller (no gain term, no convergence bound).

use crate::traits::Range;

/// Readings below this are not plausible sensor exposures.
pub const EXPOSURE_FLOOR_NS: u64 = 1_000_000;

/// Substitute for implausible readings: one frame period at 30 fps.
pub const FALLBACK_EXPOSURE_NS: u64 = 33_330_000;

/// Amount subtracted from the observed exposure for the next request.
pub const EXPOSURE_OFFSET_NS: u64 = 1_000_000;

/// Constants of the feedback law.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureFeedback {
    /// Minimum plausible reported exposure.
    pub floor_ns: u64,
    /// Exposure assumed when the report is below `floor_ns`.
    pub fallback_ns: u64,
    /// Offset subtracted from the effective exposure.
    pub offset_ns: u64,
}

impl Default for ExposureFeedback {
    fn default() -> Self {
        Self {
            floor_ns: EXPOSURE_FLOOR_NS,
            fallback_ns: FALLBACK_EXPOSURE_NS,
            offset_ns: EXPOSURE_OFFSET_NS,
        }
    }
}

impl ExposureFeedback {
    /// The exposure the next target is derived from.
    #[must_use]
    pub const fn effective_exposure(&self, reported_ns: u64) -> u64 {
        if reported_ns < self.floor_ns {
            self.fallback_ns
        } else {
            reported_ns
        }
    }

    /// Exposure range for the next request.
    #[must_use]
    pub const fn next_range(&self, reported_ns: u64) -> Range {
        Range::point(
            self.effective_exposure(reported_ns)
                .saturating_sub(self.offset_ns),
        )
    }
}

/// Result of one feedback cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptOutcome {
    /// The request was rewritten and resubmitted.
    Adapted {
        /// Exposure reported by the newest completion event.
        reported_ns: u64,
        /// Range programmed into the request.
        exposure_range: Range,
    },
    /// The newest event carried no metadata; the request is unchanged.
    Degraded,
}
