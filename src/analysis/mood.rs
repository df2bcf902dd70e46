// ============================================================================
// MOOD.RS - Image Mood Metrics
// ============================================================================
//
// Averages the HSV value (brightness) and saturation of every pixel that is
// not pure black. Black pixels are the empty canvas and would drag both
// numbers toward zero, so they are skipped entirely.
//
// The signal chain uses these two numbers:
// - brightness -> master gain (dark pictures play quieter)
// - saturation -> tone filter cutoff (vivid pictures sound brighter)
// ============================================================================

use super::PixelBuffer;

/// Overall look of an image, both values in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualMetrics {
    pub saturation: f32,
    pub brightness: f32,
}

impl VisualMetrics {
    /// Creates metrics, clamping both values into [0, 1]
    pub fn new(saturation: f32, brightness: f32) -> Self {
        Self {
            saturation: clamp_unit(saturation),
            brightness: clamp_unit(brightness),
        }
    }
}

impl Default for VisualMetrics {
    /// Neutral mood used before any image has been analyzed
    fn default() -> Self {
        Self {
            saturation: 0.5,
            brightness: 0.5,
        }
    }
}

/// Clamps into [0, 1], mapping NaN to 0
fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Converts one pixel to (saturation, value) in HSV space
fn saturation_and_value(rgba: [u8; 4]) -> (f32, f32) {
    let r = rgba[0] as f32 / 255.0;
    let g = rgba[1] as f32 / 255.0;
    let b = rgba[2] as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let saturation = if max > 0.0 { (max - min) / max } else { 0.0 };

    (saturation, max)
}

/// Measures mean saturation and brightness over the non-black pixels
///
/// An image with no non-black pixels gives `{0, 0}`.
pub fn measure_mood(pixels: &PixelBuffer) -> VisualMetrics {
    let mut total_saturation = 0.0_f64;
    let mut total_brightness = 0.0_f64;
    let mut counted: u64 = 0;

    for rgba in pixels.pixels() {
        if rgba[0] == 0 && rgba[1] == 0 && rgba[2] == 0 {
            continue;
        }
        let (saturation, brightness) = saturation_and_value(rgba);
        total_saturation += saturation as f64;
        total_brightness += brightness as f64;
        counted += 1;
    }

    if counted == 0 {
        return VisualMetrics::new(0.0, 0.0);
    }

    let metrics = VisualMetrics::new(
        (total_saturation / counted as f64) as f32,
        (total_brightness / counted as f64) as f32,
    );
    log::debug!(
        "mood over {} pixels: saturation {:.3}, brightness {:.3}",
        counted,
        metrics.saturation,
        metrics.brightness
    );
    metrics
}

// ============================================================================
// UNIT TESTS
// ============================================================================
