//! The camera's single capture request.

use tracing::debug;

use crate::error::{required, CameraError, Result};
use crate::traits::{CaptureRequest, ClipRect, Range, SensorMode, StreamId};

/// Owns the one request a camera submits.
///
/// The request is configured once and afterwards only its exposure bounds are
/// rewritten in place, so its stream binding survives every resubmission.
#[derive(Debug)]
pub struct RequestController<R> {
    request: R,
    stream: StreamId,
}

impl<R: CaptureRequest> RequestController<R> {
    /// Bind `request` to `stream`, select `mode`, lock the frame duration
    /// and crop to the full sensor area.
    pub(crate) fn configure(
        mut request: R,
        stream: StreamId,
        mode: &SensorMode,
        frame_duration_ns: u64,
    ) -> Result<Self> {
        required("output stream binding", request.enable_output_stream(stream))?;
        required("source settings", request.set_sensor_mode(mode))?;
        required(
            "source settings",
            request.set_frame_duration_range(Range::point(frame_duration_ns)),
        )?;
        required(
            "stream settings",
            request.set_source_clip_rect(stream, ClipRect::FULL),
        )?;
        debug!(mode = %mode.label, frame_duration_ns, "request configured");
        Ok(Self { request, stream })
    }

    /// Rewrite the exposure bounds. Takes effect on the next submission.
    pub fn set_exposure_range(&mut self, min_ns: u64, max_ns: u64) -> Result<()> {
        if min_ns > max_ns {
            return Err(CameraError::Parameter(format!(
                "exposure range inverted: {min_ns} > {max_ns}"
            )));
        }
        self.request
            .set_exposure_time_range(Range::new(min_ns, max_ns))
    }

    /// Current exposure bounds.
    pub fn exposure_range(&self) -> Range {
        self.request.exposure_time_range()
    }

    /// Stream the request is bound to.
    pub const fn stream(&self) -> StreamId {
        self.stream
    }

    pub(crate) const fn request(&self) -> &R {
        &self.request
    }
}
