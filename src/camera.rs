//! Capture session lifecycle: construction, repeating and one-shot capture,
//! exposure feedback and teardown.

use tracing::{debug, error, info, warn};

use crate::config::CameraConfig;
use crate::error::{required, CameraError, Result};
use crate::events::{Completion, CompletionEventLoop};
use crate::exposure::AdaptOutcome;
use crate::frame::{FrameAcquisition, Image, ReadOutcome};
use crate::request::RequestController;
use crate::sensor_mode::SensorModeSelector;
use crate::stream::negotiate_stream;
use crate::traits::{
    CameraProvider, CaptureIntent, CaptureSession, EventType, OutputStream, Range, SensorDevice,
    SensorMode,
};

/// One sensor driven through a capture session.
///
/// All calls happen on one control thread: event waits, exposure updates and
/// frame reads are interleaved by the caller. Dropping the camera stops
/// repeating capture, waits for the session to go idle and only then
/// disconnects the stream.
pub struct Camera<S: CaptureSession> {
    // Fields drop in declaration order, the reverse of creation.
    events: CompletionEventLoop,
    request: RequestController<S::Request>,
    frames: FrameAcquisition<S::Consumer>,
    stream: S::Stream,
    session: S,
    devices: Vec<String>,
    sensor_mode: SensorMode,
    config: CameraConfig,
    repeating: bool,
}

impl<S: CaptureSession> std::fmt::Debug for Camera<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("device", &self.config.device_index)
            .field("resolution", &self.config.resolution)
            .field("sensor_mode", &self.sensor_mode.label)
            .field("repeating", &self.repeating)
            .finish_non_exhaustive()
    }
}

impl<S: CaptureSession> Camera<S> {
    /// Open the device named by `config` using the configured sensor mode
    /// policy.
    pub fn open<P>(provider: &P, config: CameraConfig) -> Result<Self>
    where
        P: CameraProvider<Session = S>,
    {
        let policy = config.sensor_mode;
        Self::open_with_selector(provider, config, &policy)
    }

    /// Open the device named by `config`, choosing the sensor mode with
    /// `selector`.
    ///
    /// Any failure releases what was created so far, newest first, before
    /// the error is returned.
    pub fn open_with_selector<P>(
        provider: &P,
        config: CameraConfig,
        selector: &dyn SensorModeSelector,
    ) -> Result<Self>
    where
        P: CameraProvider<Session = S>,
    {
        config.validate()?;

        let devices = required("camera provider", provider.devices())?;
        let device = devices.get(config.device_index).ok_or_else(|| {
            CameraError::Configuration(format!(
                "device index {} out of range ({} devices)",
                config.device_index,
                devices.len()
            ))
        })?;
        let names: Vec<String> = devices.iter().map(SensorDevice::name).collect();

        let mut session = required("capture session", provider.create_session(device))?;
        let (stream, consumer) = negotiate_stream(&mut session, &config)?;
        let request = required("request", session.create_request(CaptureIntent::Manual))?;

        let modes = required("sensor modes", device.sensor_modes())?;
        info!(count = modes.len(), "sensor modes");
        let sensor_mode = selector.select(&modes, &config).cloned().ok_or_else(|| {
            CameraError::Initialization {
                capability: "sensor mode",
                source: Box::new(CameraError::Configuration(format!(
                    "no mode of {} fits {}x{} at {} fps",
                    modes.len(),
                    config.resolution.width,
                    config.resolution.height,
                    config.fps
                ))),
            }
        })?;
        info!(index = sensor_mode.index, mode = %sensor_mode.label, "sensor mode selected");

        let request = RequestController::configure(
            request,
            stream.id(),
            &sensor_mode,
            config.frame_duration_ns(),
        )?;

        let queue = required(
            "event provider",
            session.create_event_queue(&[EventType::CaptureComplete]),
        )?;
        let events = CompletionEventLoop::new(queue, config.event_timeout);
        let frames = FrameAcquisition::new(consumer, config.resolution, config.enable_metadata);

        info!(device = config.device_index, "camera initialized");

        Ok(Self {
            events,
            request,
            frames,
            stream,
            session,
            devices: names,
            sensor_mode,
            config,
            repeating: false,
        })
    }

    /// Log the available devices and return how many there are.
    pub fn list_devices(&self) -> usize {
        for (index, name) in self.devices.iter().enumerate() {
            info!(index, name = %name, "device");
        }
        self.devices.len()
    }

    /// Names of the devices seen at construction.
    pub fn device_names(&self) -> &[String] {
        &self.devices
    }

    /// The sensor mode programmed into the request.
    pub const fn sensor_mode(&self) -> &SensorMode {
        &self.sensor_mode
    }

    /// Construction parameters.
    pub const fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Whether repeating capture is active.
    pub const fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// Whether the session has no capture in flight.
    pub fn is_idle(&self) -> bool {
        self.session.is_idle()
    }

    /// Whether the output stream is connected.
    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    /// Exposure bounds of the request.
    pub fn exposure_range(&self) -> Range {
        self.request.exposure_range()
    }

    /// Rewrite the request's exposure bounds for the next submission.
    pub fn set_exposure_range(&mut self, min_ns: u64, max_ns: u64) -> Result<()> {
        self.request.set_exposure_range(min_ns, max_ns)
    }

    /// Submit the request for continuous capture and wait for the stream to
    /// connect.
    pub fn start_repeating(&mut self) -> Result<()> {
        self.session.repeat(self.request.request())?;
        self.repeating = true;
        self.stream.wait_until_connected(self.config.connect_timeout)?;
        debug!("repeating capture started");
        Ok(())
    }

    /// Stop repeating capture and wait for the session to go idle.
    ///
    /// Safe to call when nothing is repeating.
    pub fn stop_repeating(&mut self) -> Result<()> {
        self.session.stop_repeat();
        self.repeating = false;
        self.session.wait_for_idle()
    }

    /// Submit the request for one capture.
    ///
    /// Does not wait for the stream; use [`Camera::wait_for_connection`]
    /// before the first read if nothing has connected it yet.
    pub fn capture_once(&mut self) -> Result<()> {
        self.session.capture(self.request.request())
    }

    /// Block until the output stream is connected.
    pub fn wait_for_connection(&mut self) -> Result<()> {
        self.stream.wait_until_connected(self.config.connect_timeout)
    }

    /// Read the next frame into `out`.
    ///
    /// `out` is resized to the configured resolution on
    /// [`ReadOutcome::Frame`] and cleared otherwise.
    pub fn read(&mut self, out: &mut Image) -> Result<ReadOutcome> {
        if !self.stream.is_connected() {
            out.clear();
            return Err(CameraError::Frame("output stream is not connected".to_owned()));
        }
        self.frames.acquire(out)
    }

    /// Wait for the newest completion event and retarget the request's
    /// exposure at what the sensor reported, then resubmit it.
    ///
    /// Returns [`AdaptOutcome::Degraded`] without touching the request when
    /// the event carries no metadata.
    pub fn wait_for_completion_and_adapt_exposure(&mut self) -> Result<AdaptOutcome> {
        let Completion::Metadata(metadata) = self.events.wait_for_completion(&mut self.session)?
        else {
            return Ok(AdaptOutcome::Degraded);
        };

        let reported_ns = metadata.sensor_exposure_ns;
        let law = self.config.exposure;
        if law.effective_exposure(reported_ns) != reported_ns {
            debug!(
                reported_ns,
                fallback_ns = law.fallback_ns,
                "implausible exposure, using fallback"
            );
        }

        let exposure_range = law.next_range(reported_ns);
        if let Err(err) = self
            .request
            .set_exposure_range(exposure_range.min, exposure_range.max)
        {
            warn!(%err, "exposure range rejected");
            return Err(err);
        }

        if let Err(err) = self.start_repeating() {
            error!(%err, "failed to resubmit request");
            return Err(err);
        }

        Ok(AdaptOutcome::Adapted {
            reported_ns,
            exposure_range,
        })
    }
}

impl<S: CaptureSession> Drop for Camera<S> {
    fn drop(&mut self) {
        if let Err(err) = self.stop_repeating() {
            warn!(%err, "session did not go idle during teardown");
        }
        self.stream.disconnect();
        debug!("camera torn down");
    }
}
