//! Mock backend for testing without hardware.
//!
//! Every handle created from one [`MockProvider`] shares a single state cell,
//! so tests can script events and frames, inject failures and inspect the
//! call log after the camera has consumed the handles.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{CameraError, Result};
use crate::traits::{
    BufferFormat, CameraProvider, CaptureEvent, CaptureIntent, CaptureMetadata, CaptureRequest,
    CaptureSession, CapturedFrame, ClipRect, EventQueue, EventType, FrameConsumer, MappedBuffer,
    OutputStream, Range, SensorDevice, SensorMode, Size, StreamId, StreamSettings,
};

/// Exposure limits advertised by every mock sensor mode.
pub const MOCK_EXPOSURE_LIMITS: Range = Range::new(10_000, 500_000_000);

/// Exposure reported before anything was submitted.
const DEFAULT_EXPOSURE_NS: u64 = 10_000_000;

/// Bytes of padding after each mapped row.
const ROW_PADDING: usize = 16;

/// Backend operations recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// `CameraProvider::create_session`.
    CreateSession,
    /// `CaptureSession::create_output_stream`.
    CreateStream,
    /// `CaptureSession::create_frame_consumer`.
    CreateConsumer,
    /// `CaptureSession::create_request`.
    CreateRequest,
    /// `CaptureSession::create_event_queue`.
    CreateEventQueue,
    /// `CaptureSession::repeat`.
    Repeat,
    /// `CaptureSession::stop_repeat`.
    StopRepeat,
    /// `CaptureSession::wait_for_idle`.
    WaitForIdle,
    /// `CaptureSession::capture`.
    Capture,
    /// `CaptureSession::wait_for_events`.
    WaitForEvents,
    /// `OutputStream::wait_until_connected`.
    Connect,
    /// `OutputStream::disconnect`.
    Disconnect,
    /// `FrameConsumer::acquire_frame`.
    AcquireFrame,
    /// `CapturedFrame::map`.
    Map,
    /// A mapping was dropped.
    Unmap,
    /// The request was dropped.
    DropRequest,
    /// The consumer was dropped.
    DropConsumer,
    /// The stream was dropped.
    DropStream,
    /// The session was dropped.
    DropSession,
}

/// Injectable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Session creation.
    Session,
    /// Output stream creation.
    Stream,
    /// Frame consumer creation.
    Consumer,
    /// Request creation.
    Request,
    /// Event queue creation.
    EventQueue,
    /// Sensor mode query.
    SensorModes,
    /// Setting the source crop.
    ClipRect,
    /// Mapping a frame.
    Map,
    /// The session reports itself busy on submission.
    Repeat,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    failure: Option<Failure>,
    repeating: bool,
    pending: u32,
    connected: bool,
    idle_at_disconnect: Option<bool>,
    batches: VecDeque<Vec<CaptureEvent>>,
    frames_remaining: Option<u32>,
    live_mappings: usize,
    submissions: Vec<Range>,
    metadata_enabled: bool,
}

impl MockState {
    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }

    fn fails(&self, failure: Failure) -> bool {
        self.failure == Some(failure)
    }

    const fn is_idle(&self) -> bool {
        !self.repeating && self.pending == 0
    }

    fn current_exposure(&self) -> u64 {
        self.submissions
            .last()
            .map_or(DEFAULT_EXPOSURE_NS, |range| range.min)
    }
}

type Shared = Rc<RefCell<MockState>>;

fn injected(what: &str) -> CameraError {
    CameraError::Session(format!("mock {what} failure"))
}

/// A completion event with the given exposure, or without metadata.
pub fn complete(exposure_ns: Option<u64>) -> CaptureEvent {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    CaptureEvent {
        kind: EventType::CaptureComplete,
        capture_id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        metadata: exposure_ns.map(|sensor_exposure_ns| CaptureMetadata { sensor_exposure_ns }),
    }
}

/// Mock provider for testing without hardware.
#[derive(Debug)]
pub struct MockProvider {
    state: Shared,
    device_count: usize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// One sensor with four modes; mode 2 is 1280x720.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Shared::default(),
            device_count: 1,
        }
    }

    /// Expose `count` identical sensors.
    #[must_use]
    pub const fn with_device_count(mut self, count: usize) -> Self {
        self.device_count = count;
        self
    }

    /// Fail the given operation.
    #[must_use]
    pub fn with_failure(self, failure: Failure) -> Self {
        self.set_failure(Some(failure));
        self
    }

    /// Replace the injected failure; `None` clears it.
    pub fn set_failure(&self, failure: Option<Failure>) {
        self.state.borrow_mut().failure = failure;
    }

    /// Force the session's repeating flag.
    pub fn set_repeating(&self, repeating: bool) {
        self.state.borrow_mut().repeating = repeating;
    }

    /// Force the stream's connected flag.
    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    /// Frames left before the consumer reports end of stream. `None` is
    /// unlimited.
    pub fn set_frames_remaining(&self, frames: Option<u32>) {
        self.state.borrow_mut().frames_remaining = frames;
    }

    /// Queue one batch of events for the next wait.
    pub fn push_events(&self, events: Vec<CaptureEvent>) {
        self.state.borrow_mut().batches.push_back(events);
    }

    /// Backend calls so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Exposure ranges of every submitted request, oldest first.
    pub fn submissions(&self) -> Vec<Range> {
        self.state.borrow().submissions.clone()
    }

    /// Mappings not yet dropped.
    pub fn live_mappings(&self) -> usize {
        self.state.borrow().live_mappings
    }

    /// Whether the session was idle when the stream was disconnected.
    pub fn was_idle_at_disconnect(&self) -> bool {
        self.state.borrow().idle_at_disconnect == Some(true)
    }
}

impl CameraProvider for MockProvider {
    type Device = MockDevice;
    type Session = MockSession;

    fn devices(&self) -> Result<Vec<MockDevice>> {
        Ok((0..self.device_count)
            .map(|index| MockDevice {
                index,
                state: Rc::clone(&self.state),
            })
            .collect())
    }

    fn create_session(&self, _device: &MockDevice) -> Result<MockSession> {
        let mut state = self.state.borrow_mut();
        state.record(Call::CreateSession);
        if state.fails(Failure::Session) {
            return Err(injected("session"));
        }
        Ok(MockSession {
            state: Rc::clone(&self.state),
        })
    }
}

/// Mock sensor.
#[derive(Debug)]
pub struct MockDevice {
    index: usize,
    state: Shared,
}

fn mock_mode(index: usize, width: u32, height: u32) -> SensorMode {
    SensorMode {
        index,
        resolution: Size::new(width, height),
        frame_duration_range: Some(Range::new(1_000_000_000 / 60, 1_000_000_000 / 2)),
        exposure_time_range: Some(MOCK_EXPOSURE_LIMITS),
        label: format!("{width}x{height}"),
    }
}

impl SensorDevice for MockDevice {
    fn name(&self) -> String {
        format!("Mock Sensor {}", self.index)
    }

    fn sensor_modes(&self) -> Result<Vec<SensorMode>> {
        if self.state.borrow().fails(Failure::SensorModes) {
            return Err(injected("sensor mode query"));
        }
        Ok(vec![
            mock_mode(0, 2592, 1944),
            mock_mode(1, 1920, 1080),
            mock_mode(2, 1280, 720),
            mock_mode(3, 640, 480),
        ])
    }
}

/// Mock capture session.
#[derive(Debug)]
pub struct MockSession {
    state: Shared,
}

impl CaptureSession for MockSession {
    type Stream = MockStream;
    type Consumer = MockConsumer;
    type Request = MockRequest;

    fn create_output_stream(&mut self, settings: &StreamSettings) -> Result<MockStream> {
        let mut state = self.state.borrow_mut();
        state.record(Call::CreateStream);
        if state.fails(Failure::Stream) {
            return Err(injected("output stream"));
        }
        state.metadata_enabled = settings.metadata_enabled;
        Ok(MockStream {
            state: Rc::clone(&self.state),
        })
    }

    fn create_frame_consumer(&mut self, _stream: &MockStream) -> Result<MockConsumer> {
        let mut state = self.state.borrow_mut();
        state.record(Call::CreateConsumer);
        if state.fails(Failure::Consumer) {
            return Err(injected("frame consumer"));
        }
        Ok(MockConsumer {
            state: Rc::clone(&self.state),
        })
    }

    fn create_request(&mut self, intent: CaptureIntent) -> Result<MockRequest> {
        let mut state = self.state.borrow_mut();
        state.record(Call::CreateRequest);
        if state.fails(Failure::Request) {
            return Err(injected("request"));
        }
        Ok(MockRequest {
            state: Rc::clone(&self.state),
            intent,
            streams: Vec::new(),
            sensor_mode: None,
            frame_duration: None,
            clip_rect: None,
            exposure_limits: MOCK_EXPOSURE_LIMITS,
            exposure: MOCK_EXPOSURE_LIMITS,
        })
    }

    fn create_event_queue(&mut self, kinds: &[EventType]) -> Result<EventQueue> {
        let mut state = self.state.borrow_mut();
        state.record(Call::CreateEventQueue);
        if state.fails(Failure::EventQueue) {
            return Err(injected("event provider"));
        }
        Ok(EventQueue::new(kinds))
    }

    fn repeat(&mut self, request: &MockRequest) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::Repeat);
        if state.fails(Failure::Repeat) {
            return Err(CameraError::Session("session busy".to_owned()));
        }
        state.repeating = true;
        state.submissions.push(request.exposure);
        Ok(())
    }

    fn stop_repeat(&mut self) {
        let mut state = self.state.borrow_mut();
        state.record(Call::StopRepeat);
        state.repeating = false;
    }

    fn wait_for_idle(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::WaitForIdle);
        if state.repeating {
            return Err(CameraError::Session(
                "repeating capture still active".to_owned(),
            ));
        }
        state.pending = 0;
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.state.borrow().is_idle()
    }

    fn capture(&mut self, request: &MockRequest) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::Capture);
        if state.fails(Failure::Repeat) {
            return Err(CameraError::Session("session busy".to_owned()));
        }
        state.pending += 1;
        state.submissions.push(request.exposure);
        Ok(())
    }

    fn wait_for_events(&mut self, queue: &mut EventQueue, timeout: Option<Duration>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::WaitForEvents);
        if let Some(batch) = state.batches.pop_front() {
            queue.replace(batch);
            return Ok(());
        }
        if state.repeating {
            return Err(CameraError::EventTimeout(timeout.unwrap_or_default()));
        }
        if state.pending == 0 {
            return Err(CameraError::EventSource(
                "no capture in flight".to_owned(),
            ));
        }
        let exposure = state.current_exposure();
        queue.replace([complete(Some(exposure))]);
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.state.borrow_mut().record(Call::DropSession);
    }
}

/// Mock output stream, always id 1.
#[derive(Debug)]
pub struct MockStream {
    state: Shared,
}

impl OutputStream for MockStream {
    fn id(&self) -> StreamId {
        StreamId(1)
    }

    fn wait_until_connected(&mut self, _timeout: Option<Duration>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::Connect);
        state.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.record(Call::Disconnect);
        let idle = state.is_idle();
        state.idle_at_disconnect = Some(idle);
        state.connected = false;
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.borrow_mut().record(Call::DropStream);
    }
}

/// Mock request with inspectable settings.
#[derive(Debug)]
pub struct MockRequest {
    state: Shared,
    intent: CaptureIntent,
    streams: Vec<StreamId>,
    sensor_mode: Option<SensorMode>,
    frame_duration: Option<Range>,
    clip_rect: Option<ClipRect>,
    exposure_limits: Range,
    exposure: Range,
}

impl MockRequest {
    /// Intent the request was created with.
    pub const fn intent(&self) -> CaptureIntent {
        self.intent
    }

    /// Enabled output streams.
    pub fn streams(&self) -> &[StreamId] {
        &self.streams
    }

    /// Selected sensor mode.
    pub const fn sensor_mode(&self) -> Option<&SensorMode> {
        self.sensor_mode.as_ref()
    }

    /// Frame duration range, once set.
    pub const fn frame_duration(&self) -> Option<Range> {
        self.frame_duration
    }

    /// Source crop, once set.
    pub const fn clip_rect(&self) -> Option<ClipRect> {
        self.clip_rect
    }
}

impl CaptureRequest for MockRequest {
    fn enable_output_stream(&mut self, stream: StreamId) -> Result<()> {
        self.streams.push(stream);
        Ok(())
    }

    fn set_sensor_mode(&mut self, mode: &SensorMode) -> Result<()> {
        if let Some(limits) = mode.exposure_time_range {
            self.exposure_limits = limits;
            self.exposure = limits;
        }
        self.sensor_mode = Some(mode.clone());
        Ok(())
    }

    fn set_frame_duration_range(&mut self, range: Range) -> Result<()> {
        self.frame_duration = Some(range);
        Ok(())
    }

    fn set_exposure_time_range(&mut self, range: Range) -> Result<()> {
        if !range.is_within(&self.exposure_limits) {
            return Err(CameraError::Parameter(format!(
                "exposure {}..{} outside {}..{}",
                range.min, range.max, self.exposure_limits.min, self.exposure_limits.max
            )));
        }
        self.exposure = range;
        Ok(())
    }

    fn exposure_time_range(&self) -> Range {
        self.exposure
    }

    fn set_source_clip_rect(&mut self, _stream: StreamId, rect: ClipRect) -> Result<()> {
        if self.state.borrow().fails(Failure::ClipRect) {
            return Err(CameraError::Parameter("clip rect rejected".to_owned()));
        }
        self.clip_rect = Some(rect);
        Ok(())
    }
}

impl Drop for MockRequest {
    fn drop(&mut self) {
        self.state.borrow_mut().record(Call::DropRequest);
    }
}

/// Mock frame consumer.
///
/// Delivers frames while capture is repeating or a one-shot capture is
/// pending, and reports end of stream once `frames_remaining` runs out.
#[derive(Debug)]
pub struct MockConsumer {
    state: Shared,
}

impl FrameConsumer for MockConsumer {
    type Frame = MockFrame;

    fn acquire_frame(&mut self) -> Result<Option<MockFrame>> {
        let mut state = self.state.borrow_mut();
        state.record(Call::AcquireFrame);
        if !state.connected {
            return Err(CameraError::Frame("stream disconnected".to_owned()));
        }
        if state.frames_remaining == Some(0) {
            return Ok(None);
        }
        if !state.repeating {
            if state.pending == 0 {
                return Ok(None);
            }
            state.pending -= 1;
        }
        if let Some(remaining) = state.frames_remaining.as_mut() {
            *remaining -= 1;
        }

        let metadata = state.metadata_enabled.then(|| CaptureMetadata {
            sensor_exposure_ns: state.current_exposure(),
        });
        Ok(Some(MockFrame {
            state: Rc::clone(&self.state),
            metadata,
        }))
    }
}

impl Drop for MockConsumer {
    fn drop(&mut self) {
        self.state.borrow_mut().record(Call::DropConsumer);
    }
}

/// Mock frame filled with a coordinate pattern.
#[derive(Debug)]
pub struct MockFrame {
    state: Shared,
    metadata: Option<CaptureMetadata>,
}

impl CapturedFrame for MockFrame {
    type Mapping<'a> = MockMapping where Self: 'a;

    fn metadata(&self) -> Option<CaptureMetadata> {
        self.metadata
    }

    fn map(&mut self, resolution: Size, format: BufferFormat) -> Result<MockMapping> {
        let mut state = self.state.borrow_mut();
        state.record(Call::Map);
        if state.fails(Failure::Map) {
            return Err(CameraError::Frame("buffer map failed".to_owned()));
        }
        state.live_mappings += 1;

        let pitch = resolution.width as usize * format.bytes_per_pixel() + ROW_PADDING;
        Ok(MockMapping {
            state: Rc::clone(&self.state),
            data: coordinate_pattern(resolution, pitch),
            pitch,
        })
    }
}

/// RGBA (x, y, x + y, 255) per pixel, truncated to a byte.
#[allow(clippy::cast_possible_truncation)]
fn coordinate_pattern(size: Size, pitch: usize) -> Vec<u8> {
    let mut data = vec![0u8; pitch * size.height as usize];
    for (y, row) in data.chunks_exact_mut(pitch).enumerate() {
        for (x, pixel) in row.chunks_exact_mut(4).take(size.width as usize).enumerate() {
            pixel.copy_from_slice(&[x as u8, y as u8, (x + y) as u8, 255]);
        }
    }
    data
}

/// Host mapping of a [`MockFrame`]; counted until dropped.
#[derive(Debug)]
pub struct MockMapping {
    state: Shared,
    data: Vec<u8>,
    pitch: usize,
}

impl MappedBuffer for MockMapping {
    fn sync_for_cpu(&mut self) -> Result<()> {
        Ok(())
    }

    fn pitch(&self) -> usize {
        self.pitch
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for MockMapping {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.record(Call::Unmap);
        state.live_mappings = state.live_mappings.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_devices() {
        let provider = MockProvider::new().with_device_count(2);
        let devices = provider.devices().expect("devices should succeed");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices.first().map(SensorDevice::name).as_deref(), Some("Mock Sensor 0"));

        let modes = devices
            .first()
            .expect("device")
            .sensor_modes()
            .expect("sensor_modes should succeed");
        assert_eq!(modes.get(2).map(|m| m.resolution), Some(Size::new(1280, 720)));
    }

    #[test]
    fn test_mock_wait_for_idle_requires_stop() {
        let provider = MockProvider::new();
        let devices = provider.devices().expect("devices");
        let mut session = provider
            .create_session(devices.first().expect("device"))
            .expect("session");
        provider.set_repeating(true);

        assert!(session.wait_for_idle().is_err());
        session.stop_repeat();
        session.wait_for_idle().expect("idle after stop");
        assert!(session.is_idle());
    }

    #[test]
    fn test_coordinate_pattern_layout() {
        let data = coordinate_pattern(Size::new(3, 2), 3 * 4 + ROW_PADDING);
        assert_eq!(data.len(), 2 * (12 + ROW_PADDING));
        assert_eq!(data.get(..4), Some(&[0, 0, 0, 255][..]));
        let second_row = 12 + ROW_PADDING;
        assert_eq!(data.get(second_row + 4..second_row + 8), Some(&[1, 1, 2, 255][..]));
    }
}
