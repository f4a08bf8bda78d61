//! Frame acquisition and colour conversion into caller images.

use tracing::{info, warn};

use crate::error::{CameraError, Result};
use crate::traits::{BufferFormat, CapturedFrame, FrameConsumer, MappedBuffer, Size};

/// A packed 3-channel BGR image owned by the caller.
///
/// An empty image has zero size and no pixel data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Image {
    /// Bytes per pixel.
    pub const CHANNELS: usize = 3;

    /// Create an empty image.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Image dimensions.
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Whether the image holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Packed BGR bytes, row-major without padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// BGR values at (`x`, `y`), if inside the image.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        match self.data.get(offset..offset + Self::CHANNELS)? {
            [b, g, r] => Some([*b, *g, *r]),
            _ => None,
        }
    }

    /// Build an image from packed BGR bytes.
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Size::new(width, height).area() as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(CameraError::Frame(format!(
                "{width}x{height} BGR image needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Mark the image empty.
    pub fn clear(&mut self) {
        self.width = 0;
        self.height = 0;
        self.data.clear();
    }

    fn resize(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
        self.data.resize(size.area() as usize * Self::CHANNELS, 0);
    }
}

/// Outcome of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The image holds a new frame.
    Frame,
    /// The pipeline had no image; the output was cleared.
    Empty,
}

/// Convert a pitch-linear RGBA buffer into packed BGR.
///
/// `dst` must hold exactly `size.width * size.height * 3` bytes.
pub fn rgba_to_bgr(src: &[u8], pitch: usize, size: Size, dst: &mut [u8]) -> Result<()> {
    let row_in = size.width as usize * BufferFormat::Rgba8.bytes_per_pixel();
    let row_out = size.width as usize * Image::CHANNELS;

    if pitch < row_in {
        return Err(CameraError::Frame(format!(
            "pitch {pitch} shorter than a {}-pixel row",
            size.width
        )));
    }
    if dst.len() != row_out * size.height as usize {
        return Err(CameraError::Frame(format!(
            "output holds {} bytes, expected {}",
            dst.len(),
            row_out * size.height as usize
        )));
    }
    if row_out == 0 {
        return Ok(());
    }

    for (y, dst_row) in dst.chunks_exact_mut(row_out).enumerate() {
        let start = y * pitch;
        let src_row = src.get(start..start + row_in).ok_or_else(|| {
            CameraError::Frame(format!("mapped buffer ends before row {y}"))
        })?;
        for (rgba, bgr) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(3)) {
            if let ([r, g, b, _], [out_b, out_g, out_r]) = (rgba, bgr) {
                *out_b = *b;
                *out_g = *g;
                *out_r = *r;
            }
        }
    }
    Ok(())
}

/// Pulls completed frames from the consumer and converts them.
#[derive(Debug)]
pub struct FrameAcquisition<C> {
    consumer: C,
    resolution: Size,
    metadata_enabled: bool,
}

impl<C: FrameConsumer> FrameAcquisition<C> {
    pub(crate) const fn new(consumer: C, resolution: Size, metadata_enabled: bool) -> Self {
        Self {
            consumer,
            resolution,
            metadata_enabled,
        }
    }

    /// Acquire the next frame into `out`.
    ///
    /// The frame's mapping is released before this returns. `out` is cleared
    /// on [`ReadOutcome::Empty`] and on error.
    pub fn acquire(&mut self, out: &mut Image) -> Result<ReadOutcome> {
        let result = self.acquire_inner(out);
        if !matches!(result, Ok(ReadOutcome::Frame)) {
            out.clear();
        }
        result
    }

    fn acquire_inner(&mut self, out: &mut Image) -> Result<ReadOutcome> {
        let Some(mut frame) = self.consumer.acquire_frame()? else {
            return Ok(ReadOutcome::Empty);
        };

        if self.metadata_enabled {
            match frame.metadata() {
                Some(metadata) => {
                    info!(
                        exposure_ns = metadata.sensor_exposure_ns,
                        "exposure from frame metadata"
                    );
                }
                None => warn!("no metadata on frame"),
            }
        }

        let mut mapping = frame.map(self.resolution, BufferFormat::Rgba8)?;
        mapping.sync_for_cpu()?;

        out.resize(self.resolution);
        rgba_to_bgr(mapping.data(), mapping.pitch(), self.resolution, &mut out.data)?;
        drop(mapping);

        Ok(ReadOutcome::Frame)
    }

    /// Output resolution.
    pub const fn resolution(&self) -> Size {
        self.resolution
    }
}
