//! V4L2 backend using the v4l crate.
//!
//! V4L2 has one buffer queue per device, so the session, stream, consumer
//! and request handles share a [`Pipeline`]. Every dequeued buffer yields
//! both a completion event and a frame; whichever side asks first performs
//! the dequeue and the other side finds its half buffered.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::{CaptureStream as _, Stream as _};
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::error::{CameraError, Result};
use crate::traits::{
    BufferFormat, CameraProvider, CaptureEvent, CaptureIntent, CaptureMetadata, CaptureRequest,
    CaptureSession, CapturedFrame, ClipRect, EventQueue, EventType, FrameConsumer, MappedBuffer,
    OutputStream, PixelFormat, Range, SensorDevice, SensorMode, Size, StreamId, StreamSettings,
};

// Camera class controls from linux/v4l2-controls.h.
const CID_EXPOSURE_AUTO: u32 = 0x009A_0901;
const CID_EXPOSURE_ABSOLUTE: u32 = 0x009A_0902;
const EXPOSURE_MANUAL: i64 = 1;

/// `exposure_absolute` counts in 100 µs units.
const NS_PER_EXPOSURE_UNIT: u64 = 100_000;

const BUFFER_COUNT: u32 = 4;

/// Dequeued frames kept for the consumer before the oldest is dropped.
const MAX_BUFFERED: usize = 4;

fn fourcc_for(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Yuv420 => FourCC::new(b"NV12"),
        PixelFormat::Yuyv => FourCC::new(b"YUYV"),
    }
}

/// Whole frames per second for a frame period, rounded to nearest.
fn fps_for(frame_duration_ns: u64) -> u32 {
    let period = frame_duration_ns.max(1);
    let fps = (1_000_000_000 + period / 2) / period;
    u32::try_from(fps).unwrap_or(u32::MAX).max(1)
}

/// Bounds of the `exposure_absolute` control in nanoseconds, if present.
fn exposure_limits(device: &Device) -> Option<Range> {
    let controls = device.query_controls().ok()?;
    let desc = controls
        .into_iter()
        .find(|desc| desc.id == CID_EXPOSURE_ABSOLUTE)?;
    let min = u64::try_from(desc.minimum.max(1)).ok()?;
    let max = u64::try_from(desc.maximum).ok()?;
    Some(Range::new(
        min.saturating_mul(NS_PER_EXPOSURE_UNIT),
        max.saturating_mul(NS_PER_EXPOSURE_UNIT),
    ))
}

/// Current sensor exposure in nanoseconds, if the device reports one.
fn read_exposure(device: &Device) -> Option<CaptureMetadata> {
    let control = device.control(CID_EXPOSURE_ABSOLUTE).ok()?;
    match control.value {
        Value::Integer(units) => u64::try_from(units).ok().map(|units| CaptureMetadata {
            sensor_exposure_ns: units.saturating_mul(NS_PER_EXPOSURE_UNIT),
        }),
        _ => None,
    }
}

/// Enumerates `/dev/video*` capture nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct V4L2Provider;

impl CameraProvider for V4L2Provider {
    type Device = V4L2Device;
    type Session = V4L2Session;

    fn devices(&self) -> Result<Vec<V4L2Device>> {
        let mut devices: Vec<V4L2Device> = v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let path = node.path().to_path_buf();
                let caps = Device::with_path(&path)
                    .and_then(|dev| dev.query_caps())
                    .ok()?;
                if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                    return None;
                }
                Some(V4L2Device {
                    index: node.index(),
                    name: node.name().unwrap_or(caps.card),
                    path,
                })
            })
            .collect();
        devices.sort_by_key(|device| device.index);
        Ok(devices)
    }

    fn create_session(&self, device: &V4L2Device) -> Result<V4L2Session> {
        let handle = Device::with_path(&device.path)?;
        let caps = handle.query_caps()?;
        if !caps.capabilities.contains(Flags::STREAMING) {
            return Err(CameraError::Session(format!(
                "{} does not support streaming I/O",
                device.name
            )));
        }
        debug!(path = %device.path.display(), driver = %caps.driver, "session opened");

        let exposure_limits = exposure_limits(&handle);
        Ok(V4L2Session {
            pipeline: Rc::new(RefCell::new(Pipeline::new(handle, exposure_limits))),
        })
    }
}

/// A V4L2 capture node.
#[derive(Debug, Clone)]
pub struct V4L2Device {
    index: usize,
    name: String,
    path: PathBuf,
}

impl V4L2Device {
    /// Device node path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SensorDevice for V4L2Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    /// One mode per distinct discrete frame size, in driver order.
    fn sensor_modes(&self) -> Result<Vec<SensorMode>> {
        let dev = Device::with_path(&self.path)?;
        let limits = exposure_limits(&dev);

        let mut sizes: Vec<(Size, FourCC)> = Vec::new();
        for desc in dev.enum_formats()? {
            for framesize in dev.enum_framesizes(desc.fourcc).unwrap_or_default() {
                for discrete in framesize.size.to_discrete() {
                    let size = Size::new(discrete.width, discrete.height);
                    if !sizes.iter().any(|(known, _)| *known == size) {
                        sizes.push((size, desc.fourcc));
                    }
                }
            }
        }

        Ok(sizes
            .into_iter()
            .enumerate()
            .map(|(index, (resolution, fourcc))| SensorMode {
                index,
                resolution,
                frame_duration_range: None,
                exposure_time_range: limits,
                label: format!("{}x{} {fourcc}", resolution.width, resolution.height),
            })
            .collect())
    }
}

#[derive(Clone, Copy)]
struct FrameLayout {
    fourcc: FourCC,
    size: Size,
    stride: usize,
}

/// Events and frames produced by dequeued buffers, plus what is in flight.
struct Completions {
    repeating: bool,
    pending: u32,
    events: VecDeque<CaptureEvent>,
    frames: VecDeque<V4L2Frame>,
}

impl Completions {
    const fn new() -> Self {
        Self {
            repeating: false,
            pending: 0,
            events: VecDeque::new(),
            frames: VecDeque::new(),
        }
    }

    const fn in_flight(&self) -> bool {
        self.repeating || self.pending > 0
    }

    /// Record one dequeued buffer as an event and a frame, dropping the
    /// oldest beyond [`MAX_BUFFERED`]. Returns `true` once the last one-shot
    /// capture has completed and streaming should stop.
    fn record(
        &mut self,
        data: Vec<u8>,
        layout: FrameLayout,
        capture_id: u64,
        metadata: Option<CaptureMetadata>,
    ) -> bool {
        self.events.push_back(CaptureEvent {
            kind: EventType::CaptureComplete,
            capture_id,
            metadata,
        });
        self.frames.push_back(V4L2Frame {
            data,
            layout,
            metadata,
        });
        if self.events.len() > MAX_BUFFERED {
            self.events.pop_front();
        }
        if self.frames.len() > MAX_BUFFERED {
            self.frames.pop_front();
            debug!(capture_id, "dropped stale frame");
        }
        if self.repeating {
            return false;
        }
        self.pending = self.pending.saturating_sub(1);
        self.pending == 0
    }
}

/// Error for a failed dequeue while waiting on completion events.
fn map_dequeue_error(err: &io::Error, timeout: Option<Duration>) -> CameraError {
    if err.kind() == io::ErrorKind::TimedOut {
        CameraError::EventTimeout(timeout.unwrap_or_default())
    } else {
        CameraError::EventSource(format!("dequeue: {err}"))
    }
}

/// State shared by all handles of one session.
struct Pipeline {
    // Declared before `device` so the buffers are released first.
    stream: Option<MmapStream<'static>>,
    device: Device,
    layout: Option<FrameLayout>,
    metadata_enabled: bool,
    exposure_limits: Option<Range>,
    applied_frame_duration: Option<u64>,
    applied_exposure: Option<u64>,
    connected: bool,
    completions: Completions,
}

impl Pipeline {
    const fn new(device: Device, exposure_limits: Option<Range>) -> Self {
        Self {
            stream: None,
            device,
            layout: None,
            metadata_enabled: false,
            exposure_limits,
            applied_frame_duration: None,
            applied_exposure: None,
            connected: false,
            completions: Completions::new(),
        }
    }

    /// Program the device from `request` where it changed since last time.
    fn apply(&mut self, request: &V4L2Request) -> Result<()> {
        if request.streams.is_empty() {
            return Err(CameraError::Session(
                "request has no output stream enabled".to_owned(),
            ));
        }

        if let Some(range) = request.frame_duration {
            if self.applied_frame_duration != Some(range.min) {
                let fps = fps_for(range.min);
                self.device
                    .set_params(&Parameters::with_fps(fps))
                    .map_err(|err| CameraError::Parameter(format!("frame interval: {err}")))?;
                self.applied_frame_duration = Some(range.min);
                debug!(fps, "frame interval programmed");
            }
        }

        if let Some(range) = request.exposure {
            if self.exposure_limits.is_none() {
                debug!("device has no exposure control, range not applied");
            } else if self.applied_exposure != Some(range.min) {
                let units = (range.min / NS_PER_EXPOSURE_UNIT).max(1);
                if let Err(err) = self.device.set_control(Control {
                    id: CID_EXPOSURE_AUTO,
                    value: Value::Integer(EXPOSURE_MANUAL),
                }) {
                    debug!(%err, "manual exposure mode not available");
                }
                self.device
                    .set_control(Control {
                        id: CID_EXPOSURE_ABSOLUTE,
                        value: Value::Integer(i64::try_from(units).unwrap_or(i64::MAX)),
                    })
                    .map_err(|err| CameraError::Parameter(format!("exposure: {err}")))?;
                self.applied_exposure = Some(range.min);
                debug!(exposure_ns = range.min, "exposure programmed");
            }
        }
        Ok(())
    }

    /// Dequeue one buffer, recording its completion event and frame.
    ///
    /// Streaming is switched off after the last one-shot capture so the next
    /// one starts from freshly queued buffers.
    fn dequeue(&mut self, timeout: Option<Duration>) -> Result<()> {
        let layout = self
            .layout
            .ok_or_else(|| CameraError::Session("no output stream".to_owned()))?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CameraError::Session("no frame consumer attached".to_owned()))?;

        if let Some(timeout) = timeout {
            stream.set_timeout(timeout);
        }
        let (buf, meta) = stream
            .next()
            .map_err(|err| map_dequeue_error(&err, timeout))?;

        // Some drivers leave bytesused at zero.
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            used => used.min(buf.len()),
        };
        let data = buf.get(..used).unwrap_or(buf).to_vec();
        let capture_id = u64::from(meta.sequence);

        let metadata = if self.metadata_enabled {
            read_exposure(&self.device)
        } else {
            None
        };

        if self.completions.record(data, layout, capture_id, metadata) {
            debug!(capture_id, "one-shot complete, stopping stream");
            if let Err(err) = self.stop_streaming() {
                warn!(%err, "failed to stop streaming after one-shot");
            }
        }
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            stream
                .stop()
                .map_err(|err| CameraError::Session(format!("stream off: {err}")))?;
        }
        Ok(())
    }
}

/// A session on one V4L2 node.
pub struct V4L2Session {
    pipeline: Rc<RefCell<Pipeline>>,
}

impl CaptureSession for V4L2Session {
    type Stream = V4L2Stream;
    type Consumer = V4L2Consumer;
    type Request = V4L2Request;

    fn create_output_stream(&mut self, settings: &StreamSettings) -> Result<V4L2Stream> {
        let mut pipeline = self.pipeline.borrow_mut();
        if pipeline.layout.is_some() {
            return Err(CameraError::Session(
                "session already has an output stream".to_owned(),
            ));
        }

        let wanted = fourcc_for(settings.pixel_format);
        let Size { width, height } = settings.resolution;
        let mut format = pipeline.device.format()?;
        format.width = width;
        format.height = height;
        format.fourcc = wanted;
        let applied = pipeline.device.set_format(&format)?;

        if applied.width != width || applied.height != height || applied.fourcc != wanted {
            return Err(CameraError::Configuration(format!(
                "device cannot produce {width}x{height} {wanted}, offered {}x{} {}",
                applied.width, applied.height, applied.fourcc
            )));
        }

        pipeline.layout = Some(FrameLayout {
            fourcc: applied.fourcc,
            size: settings.resolution,
            stride: applied.stride as usize,
        });
        pipeline.metadata_enabled = settings.metadata_enabled;

        Ok(V4L2Stream {
            id: StreamId(0),
            pipeline: Rc::clone(&self.pipeline),
        })
    }

    fn create_frame_consumer(&mut self, stream: &V4L2Stream) -> Result<V4L2Consumer> {
        let mut pipeline = self.pipeline.borrow_mut();
        let mmap = MmapStream::with_buffers(&pipeline.device, Type::VideoCapture, BUFFER_COUNT)?;
        pipeline.stream = Some(mmap);
        debug!(stream = stream.id.0, buffers = BUFFER_COUNT, "consumer attached");

        Ok(V4L2Consumer {
            pipeline: Rc::clone(&self.pipeline),
        })
    }

    fn create_request(&mut self, intent: CaptureIntent) -> Result<V4L2Request> {
        Ok(V4L2Request {
            intent,
            streams: Vec::new(),
            sensor_mode: None,
            frame_duration: None,
            exposure: None,
            exposure_limits: self.pipeline.borrow().exposure_limits,
        })
    }

    fn create_event_queue(&mut self, kinds: &[EventType]) -> Result<EventQueue> {
        Ok(EventQueue::new(kinds))
    }

    fn repeat(&mut self, request: &V4L2Request) -> Result<()> {
        let mut pipeline = self.pipeline.borrow_mut();
        pipeline.apply(request)?;
        pipeline.completions.repeating = true;
        Ok(())
    }

    fn stop_repeat(&mut self) {
        self.pipeline.borrow_mut().completions.repeating = false;
    }

    /// Streaming is switched off; buffers still queued are discarded.
    fn wait_for_idle(&mut self) -> Result<()> {
        let mut pipeline = self.pipeline.borrow_mut();
        pipeline.completions.pending = 0;
        pipeline.stop_streaming()
    }

    fn is_idle(&self) -> bool {
        !self.pipeline.borrow().completions.in_flight()
    }

    fn capture(&mut self, request: &V4L2Request) -> Result<()> {
        let mut pipeline = self.pipeline.borrow_mut();
        pipeline.apply(request)?;
        pipeline.completions.pending += 1;
        Ok(())
    }

    fn wait_for_events(&mut self, queue: &mut EventQueue, timeout: Option<Duration>) -> Result<()> {
        let mut pipeline = self.pipeline.borrow_mut();
        if pipeline.completions.events.is_empty() {
            if !pipeline.completions.in_flight() {
                return Err(CameraError::EventSource(
                    "no capture in flight".to_owned(),
                ));
            }
            pipeline.dequeue(timeout)?;
        }
        queue.replace(pipeline.completions.events.drain(..));
        Ok(())
    }
}

/// The session's single output stream.
pub struct V4L2Stream {
    id: StreamId,
    pipeline: Rc<RefCell<Pipeline>>,
}

impl OutputStream for V4L2Stream {
    fn id(&self) -> StreamId {
        self.id
    }

    // Buffers are allocated with the consumer, so connecting never blocks.
    fn wait_until_connected(&mut self, _timeout: Option<Duration>) -> Result<()> {
        let mut pipeline = self.pipeline.borrow_mut();
        if pipeline.stream.is_none() {
            return Err(CameraError::Session(
                "no frame consumer attached".to_owned(),
            ));
        }
        pipeline.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.pipeline.borrow().connected
    }

    fn disconnect(&mut self) {
        let mut pipeline = self.pipeline.borrow_mut();
        pipeline.connected = false;
        pipeline.completions.frames.clear();
        if let Err(err) = pipeline.stop_streaming() {
            warn!(%err, "failed to stop streaming on disconnect");
        }
    }
}

/// Capture settings applied to the device on submission.
#[derive(Debug, Clone)]
pub struct V4L2Request {
    intent: CaptureIntent,
    streams: Vec<StreamId>,
    sensor_mode: Option<SensorMode>,
    frame_duration: Option<Range>,
    exposure: Option<Range>,
    exposure_limits: Option<Range>,
}

impl V4L2Request {
    /// Intent the request was created with.
    pub const fn intent(&self) -> CaptureIntent {
        self.intent
    }

    /// Selected sensor mode.
    pub const fn sensor_mode(&self) -> Option<&SensorMode> {
        self.sensor_mode.as_ref()
    }
}

impl CaptureRequest for V4L2Request {
    fn enable_output_stream(&mut self, stream: StreamId) -> Result<()> {
        if !self.streams.contains(&stream) {
            self.streams.push(stream);
        }
        Ok(())
    }

    fn set_sensor_mode(&mut self, mode: &SensorMode) -> Result<()> {
        if let Some(limits) = mode.exposure_time_range {
            self.exposure_limits = Some(limits);
        }
        self.sensor_mode = Some(mode.clone());
        Ok(())
    }

    fn set_frame_duration_range(&mut self, range: Range) -> Result<()> {
        if range.min == 0 {
            return Err(CameraError::Parameter(
                "frame duration must be positive".to_owned(),
            ));
        }
        self.frame_duration = Some(range);
        Ok(())
    }

    fn set_exposure_time_range(&mut self, range: Range) -> Result<()> {
        if let Some(limits) = self.exposure_limits {
            if !range.is_within(&limits) {
                return Err(CameraError::Parameter(format!(
                    "exposure {}..{} ns outside device range {}..{} ns",
                    range.min, range.max, limits.min, limits.max
                )));
            }
        }
        self.exposure = Some(range);
        Ok(())
    }

    fn exposure_time_range(&self) -> Range {
        self.exposure
            .or(self.exposure_limits)
            .unwrap_or(Range::new(0, u64::MAX))
    }

    fn set_source_clip_rect(&mut self, _stream: StreamId, rect: ClipRect) -> Result<()> {
        if rect == ClipRect::FULL {
            Ok(())
        } else {
            Err(CameraError::Parameter(
                "source cropping is not supported".to_owned(),
            ))
        }
    }
}

/// Consuming end of the session's buffer queue.
pub struct V4L2Consumer {
    pipeline: Rc<RefCell<Pipeline>>,
}

impl FrameConsumer for V4L2Consumer {
    type Frame = V4L2Frame;

    fn acquire_frame(&mut self) -> Result<Option<V4L2Frame>> {
        let mut pipeline = self.pipeline.borrow_mut();
        if !pipeline.connected {
            return Err(CameraError::Frame("stream disconnected".to_owned()));
        }
        if let Some(frame) = pipeline.completions.frames.pop_front() {
            return Ok(Some(frame));
        }
        if !pipeline.completions.in_flight() {
            return Ok(None);
        }
        pipeline
            .dequeue(None)
            .map_err(|err| CameraError::Frame(err.to_string()))?;
        Ok(pipeline.completions.frames.pop_front())
    }
}

/// A dequeued buffer, copied out of the mmap arena.
pub struct V4L2Frame {
    data: Vec<u8>,
    layout: FrameLayout,
    metadata: Option<CaptureMetadata>,
}

impl CapturedFrame for V4L2Frame {
    type Mapping<'a> = V4L2Mapping where Self: 'a;

    fn metadata(&self) -> Option<CaptureMetadata> {
        self.metadata
    }

    fn map(&mut self, resolution: Size, format: BufferFormat) -> Result<V4L2Mapping> {
        let FrameLayout {
            fourcc,
            size,
            stride,
        } = self.layout;
        if resolution != size {
            return Err(CameraError::Frame(format!(
                "frame is {}x{}, asked for {}x{}",
                size.width, size.height, resolution.width, resolution.height
            )));
        }

        let pitch = size.width as usize * format.bytes_per_pixel();
        let mut rgba = vec![0u8; pitch * size.height as usize];
        match format {
            BufferFormat::Rgba8 if fourcc == FourCC::new(b"YUYV") => {
                yuyv_to_rgba(&self.data, stride, size, &mut rgba)?;
            }
            BufferFormat::Rgba8 if fourcc == FourCC::new(b"NV12") => {
                nv12_to_rgba(&self.data, stride, size, &mut rgba)?;
            }
            BufferFormat::Rgba8 => {
                return Err(CameraError::Frame(format!(
                    "no RGBA conversion for {fourcc}"
                )));
            }
        }
        Ok(V4L2Mapping { data: rgba, pitch })
    }
}

/// Host-side RGBA copy of a frame.
pub struct V4L2Mapping {
    data: Vec<u8>,
    pitch: usize,
}

impl MappedBuffer for V4L2Mapping {
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

fn short_buffer(row: usize) -> CameraError {
    CameraError::Frame(format!("buffer ends before row {row}"))
}

fn check_rgba_len(size: Size, dst: &[u8]) -> Result<()> {
    let expected = size.area() as usize * 4;
    if dst.len() == expected {
        Ok(())
    } else {
        Err(CameraError::Frame(format!(
            "RGBA output holds {} bytes, expected {expected}",
            dst.len()
        )))
    }
}

/// Convert packed YUYV 4:2:2 into RGBA with an unpadded pitch.
pub fn yuyv_to_rgba(src: &[u8], stride: usize, size: Size, dst: &mut [u8]) -> Result<()> {
    check_rgba_len(size, dst)?;
    let width = size.width as usize;
    if width == 0 {
        return Ok(());
    }
    let row_in = width.div_ceil(2) * 4;

    for (y, dst_row) in dst.chunks_exact_mut(width * 4).enumerate() {
        let start = y * stride;
        let src_row = src
            .get(start..start + row_in)
            .ok_or_else(|| short_buffer(y))?;
        // Each pair of pixels shares U and V.
        for (yuyv, out) in src_row.chunks_exact(4).zip(dst_row.chunks_mut(8)) {
            if let [y0, u, y1, v] = *yuyv {
                for (luma, px) in [y0, y1].into_iter().zip(out.chunks_exact_mut(4)) {
                    let (r, g, b) = yuv_to_rgb(luma, u, v);
                    px.copy_from_slice(&[r, g, b, 255]);
                }
            }
        }
    }
    Ok(())
}

/// Convert NV12 (Y plane, then interleaved UV at half resolution) into RGBA.
pub fn nv12_to_rgba(src: &[u8], stride: usize, size: Size, dst: &mut [u8]) -> Result<()> {
    check_rgba_len(size, dst)?;
    let width = size.width as usize;
    if width == 0 {
        return Ok(());
    }
    let height = size.height as usize;
    let chroma_plane = src
        .get(stride * height..)
        .ok_or_else(|| short_buffer(height))?;
    let chroma_len = width.div_ceil(2) * 2;

    for (y, dst_row) in dst.chunks_exact_mut(width * 4).enumerate() {
        let start = y * stride;
        let luma_row = src.get(start..start + width).ok_or_else(|| short_buffer(y))?;
        let chroma_start = (y / 2) * stride;
        let chroma_row = chroma_plane
            .get(chroma_start..chroma_start + chroma_len)
            .ok_or_else(|| short_buffer(height + y / 2))?;

        for (x, (&luma, px)) in luma_row.iter().zip(dst_row.chunks_exact_mut(4)).enumerate() {
            let pair = (x / 2) * 2;
            if let Some(&[u, v]) = chroma_row.get(pair..pair + 2) {
                let (r, g, b) = yuv_to_rgb(luma, u, v);
                px.copy_from_slice(&[r, g, b, 255]);
            }
        }
    }
    Ok(())
}

/// Convert YUV to RGB using ITU-R BT.601 coefficients.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamp = |val: f32| -> u8 { val.clamp(0.0, 255.0) as u8 };

    (clamp(r), clamp(g), clamp(b))
}
