//! Error type shared by the camera core and its backends.

use std::time::Duration;
use thiserror::Error;

/// Error type for camera operations.
///
/// Setup failures ([`CameraError::Configuration`], [`CameraError::Initialization`])
/// are fatal. Everything raised from the per-cycle calls of a running camera is
/// reported back to the caller, who decides whether to retry the cycle; see
/// [`CameraError::is_recoverable`].
#[derive(Debug, Error)]
pub enum CameraError {
    /// Bad device index, or a resolution/format the device cannot produce.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A capability required during setup was not provided.
    #[error("initialization failed: {capability} unavailable")]
    Initialization {
        /// Name of the missing capability.
        capability: &'static str,
        /// What the backend reported.
        #[source]
        source: Box<CameraError>,
    },
    /// Starting, stopping or submitting capture failed.
    #[error("session error: {0}")]
    Session(String),
    /// The session's event source is broken.
    #[error("event source error: {0}")]
    EventSource(String),
    /// No capture event arrived within the configured timeout.
    #[error("no capture event within {0:?}")]
    EventTimeout(Duration),
    /// The backend rejected a request parameter.
    #[error("parameter rejected: {0}")]
    Parameter(String),
    /// Consumer-side frame acquisition failed.
    #[error("frame error: {0}")]
    Frame(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// Whether the failing cycle may be retried on the same camera.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Session(_) | Self::EventTimeout(_) | Self::Parameter(_) | Self::Frame(_)
        )
    }

    /// The capability named by an initialization failure.
    pub const fn capability(&self) -> Option<&'static str> {
        match self {
            Self::Initialization { capability, .. } => Some(capability),
            _ => None,
        }
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Tags a setup step's failure with the capability it was meant to provide.
///
/// Configuration errors pass through untouched: the caller asked for something
/// the device cannot do, rather than the device lacking an interface.
pub(crate) fn required<T>(capability: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|err| match err {
        CameraError::Configuration(_) => err,
        other => CameraError::Initialization {
            capability,
            source: Box::new(other),
        },
    })
}
