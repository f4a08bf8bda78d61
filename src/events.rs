//! Completion event wait loop.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{CameraError, Result};
use crate::traits::{CaptureMetadata, CaptureSession, EventQueue, EventType};

/// What the freshest completion event told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The event carried sensor telemetry.
    Metadata(CaptureMetadata),
    /// The event carried no metadata.
    NoMetadata,
}

/// Waits on the session's completion events.
#[derive(Debug)]
pub struct CompletionEventLoop {
    queue: EventQueue,
    timeout: Option<Duration>,
}

impl CompletionEventLoop {
    pub(crate) const fn new(queue: EventQueue, timeout: Option<Duration>) -> Self {
        Self { queue, timeout }
    }

    /// Block until capture events are queued and inspect the newest one.
    ///
    /// Older events delivered by the same wait are skipped.
    pub fn wait_for_completion<S>(&mut self, session: &mut S) -> Result<Completion>
    where
        S: CaptureSession,
    {
        session.wait_for_events(&mut self.queue, self.timeout)?;

        let queued = self.queue.len();
        debug!(queued, "capture events queued");

        let event = self.queue.latest().ok_or_else(|| {
            CameraError::EventSource("event wait returned with an empty queue".to_owned())
        })?;

        match event.kind {
            EventType::Error => Err(CameraError::EventSource(format!(
                "capture {} reported a pipeline error",
                event.capture_id
            ))),
            EventType::CaptureComplete => {
                if let Some(metadata) = event.metadata {
                    info!(
                        exposure_ns = metadata.sensor_exposure_ns,
                        capture = event.capture_id,
                        "exposure from completion event"
                    );
                    Ok(Completion::Metadata(metadata))
                } else {
                    warn!(capture = event.capture_id, "no metadata on completion event");
                    Ok(Completion::NoMetadata)
                }
            }
        }
    }

    /// Events delivered by the last wait.
    pub const fn queue(&self) -> &EventQueue {
        &self.queue
    }
}
