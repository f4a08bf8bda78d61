//! Output stream negotiation.

use tracing::debug;

use crate::config::CameraConfig;
use crate::error::{required, Result};
use crate::traits::CaptureSession;

/// Create the single output stream described by `config` and attach a frame
/// consumer to it.
///
/// On failure the stream, if already created, is dropped before the error is
/// returned.
pub fn negotiate_stream<S: CaptureSession>(
    session: &mut S,
    config: &CameraConfig,
) -> Result<(S::Stream, S::Consumer)> {
    let settings = config.stream_settings();
    debug!(
        width = settings.resolution.width,
        height = settings.resolution.height,
        format = ?settings.pixel_format,
        metadata = settings.metadata_enabled,
        "creating output stream"
    );

    let stream = required("output stream", session.create_output_stream(&settings))?;
    let consumer = required("frame consumer", session.create_frame_consumer(&stream))?;
    Ok((stream, consumer))
}
