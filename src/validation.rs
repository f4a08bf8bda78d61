//! Test pattern checks on captured images.
//!
//! Used by the integration tests against vivid virtual cameras, whose
//! built-in generators produce SMPTE colour bars and a grey ramp.

use crate::error::{CameraError, Result};
use crate::frame::Image;

/// Expected RGB values for SMPTE color bars (8 bars) after BT.601 conversion.
///
/// Colors in order: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
const SMPTE_COLOR_BARS: [(u8, u8, u8); 8] = [
    (235, 235, 235), // White
    (235, 235, 11),  // Yellow
    (12, 236, 237),  // Cyan
    (13, 237, 13),   // Green
    (237, 13, 237),  // Magenta
    (238, 14, 13),   // Red
    (15, 15, 239),   // Blue
    (16, 16, 16),    // Black
];

/// Tolerance for RGB color matching (accounts for YUV->RGB conversion errors).
const COLOR_TOLERANCE: u32 = 15;

/// Minimum luminance rise across a gradient.
const MIN_GRADIENT_RISE: f32 = 50.0;

fn rgb_at(image: &Image, x: u32, y: u32) -> Result<(u8, u8, u8)> {
    let [b, g, r] = image
        .pixel(x, y)
        .ok_or_else(|| CameraError::Frame(format!("no pixel at ({x}, {y})")))?;
    Ok((r, g, b))
}

/// Checks that `image` shows the eight SMPTE color bars.
///
/// Samples the centre of each vertical stripe on the middle row.
///
/// # Errors
///
/// Returns `Frame` if the image is too small or any bar is off by more than
/// the conversion tolerance.
pub fn validate_color_bars(image: &Image) -> Result<()> {
    let bar_width = image.width() / 8;
    if bar_width == 0 {
        return Err(CameraError::Frame(format!(
            "image {}px wide is too narrow for 8 bars",
            image.width()
        )));
    }
    let center_y = image.height() / 2;

    for (bar_x, expected) in (0u32..).zip(SMPTE_COLOR_BARS) {
        let sample_x = bar_x * bar_width + bar_width / 2;
        let actual = rgb_at(image, sample_x, center_y)?;

        if !colors_match(actual, expected, COLOR_TOLERANCE) {
            return Err(CameraError::Frame(format!(
                "color bar {bar_x} mismatch at ({sample_x}, {center_y}): \
                 expected RGB{expected:?}, got RGB{actual:?}"
            )));
        }
    }

    Ok(())
}

/// Checks that luminance rises from left to right across the middle row.
///
/// # Errors
///
/// Returns `Frame` if luminance drops anywhere or the overall rise is too
/// small to be a gradient.
pub fn validate_gradient(image: &Image) -> Result<()> {
    let center_y = image.height() / 2;
    let mut first: Option<f32> = None;
    let mut prev: Option<f32> = None;

    for x in (0..image.width()).step_by(10) {
        let (r, g, b) = rgb_at(image, x, center_y)?;
        // Y' in Rec. 601
        let luminance = 0.114f32.mul_add(
            f32::from(b),
            0.587f32.mul_add(f32::from(g), 0.299 * f32::from(r)),
        );

        if let Some(prev) = prev {
            // Allow small decreases due to rounding
            if luminance < prev - 1.0 {
                return Err(CameraError::Frame(format!(
                    "gradient not monotonically increasing at x={x}: \
                     luminance {luminance} < previous {prev}"
                )));
            }
        }
        first.get_or_insert(luminance);
        prev = Some(luminance);
    }

    let rise = match (first, prev) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };
    if rise < MIN_GRADIENT_RISE {
        return Err(CameraError::Frame(format!(
            "insufficient luminance change for gradient: {rise} \
             (expected at least {MIN_GRADIENT_RISE})"
        )));
    }

    Ok(())
}

/// Whether every channel of `actual` is within `tolerance` of `expected`.
fn colors_match(actual: (u8, u8, u8), expected: (u8, u8, u8), tolerance: u32) -> bool {
    let (ar, ag, ab) = actual;
    let (er, eg, eb) = expected;

    u32::from(ar.abs_diff(er)) <= tolerance
        && u32::from(ag.abs_diff(eg)) <= tolerance
        && u32::from(ab.abs_diff(eb)) <= tolerance
}
