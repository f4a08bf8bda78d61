//! Collaborator traits and the plain types they exchange.
//!
//! The camera core never touches hardware directly. A backend provides device
//! enumeration, a capture session, one output stream with its frame consumer,
//! one mutable request and completion events through these traits, so the
//! V4L2 implementation in [`crate::device`] and the test mock are
//! interchangeable.

use std::time::Duration;

use crate::error::Result;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether both dimensions are at least those of `other`.
    #[must_use]
    pub const fn covers(self, other: Self) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

/// Inclusive range of nanosecond values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// Lower bound.
    pub min: u64,
    /// Upper bound.
    pub max: u64,
}

impl Range {
    /// Create a new range.
    #[must_use]
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// A zero-width range holding a single value.
    #[must_use]
    pub const fn point(value: u64) -> Self {
        Self::new(value, value)
    }

    /// Whether `value` lies inside the range.
    #[must_use]
    pub const fn contains(&self, value: u64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Whether the whole range lies inside `outer`.
    #[must_use]
    pub const fn is_within(&self, outer: &Self) -> bool {
        outer.min <= self.min && self.max <= outer.max
    }
}

/// Crop rectangle in normalized source coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    /// Left edge, 0.0..=1.0.
    pub left: f32,
    /// Top edge, 0.0..=1.0.
    pub top: f32,
    /// Right edge, 0.0..=1.0.
    pub right: f32,
    /// Bottom edge, 0.0..=1.0.
    pub bottom: f32,
}

impl ClipRect {
    /// The whole sensor area.
    pub const FULL: Self = Self {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };
}

/// Pixel format produced by the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// YCbCr 4:2:0 with interleaved chroma (NV12).
    #[default]
    Yuv420,
    /// YUYV 4:2:2 packed.
    Yuyv,
}

/// Host-side layout a native buffer is converted into when mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    /// 8-bit R, G, B plus one padding byte, pitch-linear.
    Rgba8,
}

impl BufferFormat {
    /// Bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
        }
    }
}

/// A hardware-defined sensor configuration from a device's capability list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorMode {
    /// Position in the device's mode list.
    pub index: usize,
    /// Native readout resolution.
    pub resolution: Size,
    /// Supported frame durations, when the device advertises them.
    pub frame_duration_range: Option<Range>,
    /// Supported exposure times, when the device advertises them.
    pub exposure_time_range: Option<Range>,
    /// Human-readable description.
    pub label: String,
}

/// What a request is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureIntent {
    /// The application owns exposure and frame timing; automatic control
    /// loops stay off.
    #[default]
    Manual,
}

/// Settings for the single output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Pixel format.
    pub pixel_format: PixelFormat,
    /// Output resolution.
    pub resolution: Size,
    /// Whether captures attach metadata to events and frames.
    pub metadata_enabled: bool,
}

/// Identifies an output stream within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

/// Per-capture sensor telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureMetadata {
    /// Sensor exposure time in nanoseconds.
    pub sensor_exposure_ns: u64,
}

/// Kinds of events a session can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// One capture finished.
    CaptureComplete,
    /// The pipeline failed.
    Error,
}

/// An asynchronous session notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Event kind.
    pub kind: EventType,
    /// Monotonic id of the capture that produced the event.
    pub capture_id: u64,
    /// Telemetry attached to the capture, if any.
    pub metadata: Option<CaptureMetadata>,
}

/// Buffer of pending events for a fixed set of subscribed kinds.
///
/// Each wait on the session replaces the contents with the events that
/// arrived since the previous wait.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    kinds: Vec<EventType>,
    events: Vec<CaptureEvent>,
}

impl EventQueue {
    /// Create an empty queue subscribed to `kinds`.
    #[must_use]
    pub fn new(kinds: &[EventType]) -> Self {
        Self {
            kinds: kinds.to_vec(),
            events: Vec::new(),
        }
    }

    /// Whether events of `kind` are delivered to this queue.
    #[must_use]
    pub fn subscribes(&self, kind: EventType) -> bool {
        self.kinds.contains(&kind)
    }

    /// Replace the queued events, keeping only subscribed kinds.
    pub fn replace<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = CaptureEvent>,
    {
        self.events.clear();
        let kinds = &self.kinds;
        self.events
            .extend(events.into_iter().filter(|event| kinds.contains(&event.kind)));
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event at `index`, oldest first.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CaptureEvent> {
        self.events.get(index)
    }

    /// The most recently queued event.
    #[must_use]
    pub fn latest(&self) -> Option<&CaptureEvent> {
        self.events.last()
    }
}

/// Entry point of a backend: lists sensors and opens sessions on them.
pub trait CameraProvider {
    /// Device handle type.
    type Device: SensorDevice;
    /// Session type created on a device.
    type Session: CaptureSession;

    /// List available sensors.
    fn devices(&self) -> Result<Vec<Self::Device>>;

    /// Create a capture session bound to `device`.
    fn create_session(&self, device: &Self::Device) -> Result<Self::Session>;
}

/// Capability queries on one physical sensor.
pub trait SensorDevice {
    /// Display name.
    fn name(&self) -> String;

    /// The sensor modes the device advertises, in device order.
    fn sensor_modes(&self) -> Result<Vec<SensorMode>>;
}

/// A capture context bound to one device.
pub trait CaptureSession {
    /// Output stream type.
    type Stream: OutputStream;
    /// Frame consumer type.
    type Consumer: FrameConsumer;
    /// Request type.
    type Request: CaptureRequest;

    /// Create the output stream.
    fn create_output_stream(&mut self, settings: &StreamSettings) -> Result<Self::Stream>;

    /// Attach a consumer to the consuming end of `stream`.
    fn create_frame_consumer(&mut self, stream: &Self::Stream) -> Result<Self::Consumer>;

    /// Create an empty capture request.
    fn create_request(&mut self, intent: CaptureIntent) -> Result<Self::Request>;

    /// Subscribe to events of the given kinds.
    fn create_event_queue(&mut self, kinds: &[EventType]) -> Result<EventQueue>;

    /// Capture continuously with `request` until stopped. Replaces any
    /// previously repeating request.
    fn repeat(&mut self, request: &Self::Request) -> Result<()>;

    /// Ask the session to stop repeating capture.
    fn stop_repeat(&mut self);

    /// Block until all in-flight captures have completed.
    fn wait_for_idle(&mut self) -> Result<()>;

    /// Whether no capture is in flight.
    fn is_idle(&self) -> bool;

    /// Submit `request` for a single capture.
    fn capture(&mut self, request: &Self::Request) -> Result<()>;

    /// Block until events are available, then replace `queue`'s contents
    /// with them.
    fn wait_for_events(&mut self, queue: &mut EventQueue, timeout: Option<Duration>)
        -> Result<()>;
}

/// Producer end of the pixel pipe.
pub trait OutputStream {
    /// Stream identifier used by requests.
    fn id(&self) -> StreamId;

    /// Block until the stream is connected to its consumer.
    fn wait_until_connected(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Whether the stream is connected.
    fn is_connected(&self) -> bool;

    /// Disconnect the stream; no frames are delivered afterwards.
    fn disconnect(&mut self);
}

/// A mutable capture intent.
pub trait CaptureRequest {
    /// Route captures to `stream`.
    fn enable_output_stream(&mut self, stream: StreamId) -> Result<()>;

    /// Select the sensor mode.
    fn set_sensor_mode(&mut self, mode: &SensorMode) -> Result<()>;

    /// Bound the frame duration.
    fn set_frame_duration_range(&mut self, range: Range) -> Result<()>;

    /// Bound the exposure time.
    fn set_exposure_time_range(&mut self, range: Range) -> Result<()>;

    /// Current exposure bounds.
    fn exposure_time_range(&self) -> Range;

    /// Crop the source for `stream`.
    fn set_source_clip_rect(&mut self, stream: StreamId, rect: ClipRect) -> Result<()>;
}

/// Consumer end of the pixel pipe.
pub trait FrameConsumer {
    /// Frame type.
    type Frame: CapturedFrame;

    /// Block until a completed frame is available.
    ///
    /// Returns `Ok(None)` when the pipeline has no image to deliver, e.g.
    /// after the stream ended.
    fn acquire_frame(&mut self) -> Result<Option<Self::Frame>>;
}

/// One completed frame. Dropping it returns it to the pipeline.
pub trait CapturedFrame {
    /// Host mapping of the native buffer; unmapped on drop.
    type Mapping<'a>: MappedBuffer
    where
        Self: 'a;

    /// Telemetry attached to the frame, if any.
    fn metadata(&self) -> Option<CaptureMetadata>;

    /// Map the native buffer into host memory in `format`.
    fn map(&mut self, resolution: Size, format: BufferFormat) -> Result<Self::Mapping<'_>>;
}

/// Host-addressable view of a native pixel buffer.
pub trait MappedBuffer {
    /// Make device writes visible to the host.
    fn sync_for_cpu(&mut self) -> Result<()>;

    /// Bytes per row.
    fn pitch(&self) -> usize;

    /// Pixel bytes.
    fn data(&self) -> &[u8];
}
