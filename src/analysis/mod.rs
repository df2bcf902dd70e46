// ============================================================================
// ANALYSIS MODULE - Reading Music and Mood Out of a Picture
// ============================================================================
//
// Everything in here is a pure function of the pixel data. Nothing touches
// audio, nothing keeps state between calls.
//
// SUBMODULES:
// - notes: column-band peak scan that turns the R, G and B planes into three
//   note sequences
// - mood: average HSV saturation and brightness, used to steer the chain
//
// PIXEL LAYOUT:
// A PixelBuffer is row-major RGBA, 4 bytes per pixel, no padding between
// rows. Index of pixel (x, y) = (y * width + x) * 4.
// ============================================================================

pub mod mood;
pub mod notes;

use std::fmt;

pub use mood::{measure_mood, VisualMetrics};
pub use notes::{
    extract, extract_from_image, Channel, ChannelRange, ExtractedNotes, Note, DEFAULT_STEPS,
    INTENSITY_THRESHOLD,
};

// ============================================================================
// ERRORS
// ============================================================================

/// Errors that can occur while building a pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The byte count does not match width * height * 4
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::BufferSize { width, height, expected, actual } => write!(
                f,
                "pixel buffer for {}x{} needs {} bytes, got {}",
                width, height, expected, actual
            ),
        }
    }
}

impl std::error::Error for AnalysisError {}

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// A decoded RGBA image
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes, checking that the length matches the dimensions
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, AnalysisError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(AnalysisError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Creates a fully transparent black buffer
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Converts any decoded image into RGBA8
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            data: rgba.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the [r, g, b, a] bytes of one pixel
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let index = (y * self.width as usize + x) * 4;
        [
            self.data[index],
            self.data[index + 1],
            self.data[index + 2],
            self.data[index + 3],
        ]
    }

    /// Overwrites one pixel (handy for building test images)
    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let index = (y * self.width as usize + x) * 4;
        self.data[index..index + 4].copy_from_slice(&rgba);
    }

    /// Iterates over every pixel in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.data
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
