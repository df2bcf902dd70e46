// ============================================================================
// NOTES.RS - Image to Note Extraction
// ============================================================================
//
// Turns a picture into three note sequences, one per color plane:
// - Red   -> Melody     (highest register)
// - Green -> Pluck
// - Blue  -> Percussion (pitch picks the drum sound, not a tone)
//
// HOW IT WORKS:
// 1. The image width is cut into `steps` vertical bands. Each band becomes one
//    time step. The last band also takes whatever columns are left over.
// 2. In each band, for each color plane, we look for the brightest pixel that
//    is above the threshold. Ties go to the pixel nearest the top.
// 3. The row of that pixel picks the pitch (top = high, bottom = low) and its
//    intensity picks the velocity.
// 4. A band with nothing above the threshold is a rest.
//
// The result is fully deterministic: the same pixels always give the same
// notes.
// ============================================================================

use super::PixelBuffer;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Number of time steps extracted when the caller doesn't ask for another count
pub const DEFAULT_STEPS: usize = 128;

/// A channel value must be strictly greater than this to count as a peak
pub const INTENSITY_THRESHOLD: u8 = 70;

/// Notes with a velocity below this are treated as rests by the voices
pub const SILENT_VELOCITY: f32 = 0.01;

// ============================================================================
// NOTE
// ============================================================================

/// One step of one channel
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    /// Semitone number, 0 means rest
    pub pitch: u8,

    /// Loudness from 0.0 to 1.0
    pub velocity: f32,
}

impl Note {
    /// The rest note produced when a band has no peak
    pub const REST: Note = Note { pitch: 0, velocity: 0.0 };

    pub fn new(pitch: u8, velocity: f32) -> Self {
        Self {
            pitch,
            velocity: velocity.clamp(0.0, 1.0),
        }
    }

    /// True for pitch 0 or an inaudible velocity
    pub fn is_rest(&self) -> bool {
        self.pitch == 0 || self.velocity < SILENT_VELOCITY
    }
}

// ============================================================================
// CHANNELS AND RANGES
// ============================================================================

/// Inclusive pitch range a channel maps image rows into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelRange {
    pub min_pitch: u8,
    pub max_pitch: u8,
}

impl ChannelRange {
    /// Maps a peak row into this range; row 0 gives max_pitch
    ///
    /// Formula: pitch = round(min + (1 - row / height) * (max - min))
    pub fn pitch_for_row(&self, row: usize, height: usize) -> u8 {
        let normalized_row = row as f64 / height as f64;
        let span = (self.max_pitch - self.min_pitch) as f64;
        (self.min_pitch as f64 + (1.0 - normalized_row) * span).round() as u8
    }
}

/// The three note streams, in the order they are triggered on every tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Melody,
    Pluck,
    Percussion,
}

impl Channel {
    /// All channels in trigger order
    pub const ALL: [Channel; 3] = [Channel::Melody, Channel::Pluck, Channel::Percussion];

    /// Pitch range for the channel
    pub fn range(&self) -> ChannelRange {
        match self {
            Channel::Melody => ChannelRange { min_pitch: 60, max_pitch: 72 },
            Channel::Pluck => ChannelRange { min_pitch: 48, max_pitch: 60 },
            Channel::Percussion => ChannelRange { min_pitch: 48, max_pitch: 60 },
        }
    }

    /// Which byte of an RGBA pixel feeds this channel
    fn color_offset(&self) -> usize {
        match self {
            Channel::Melody => 0,
            Channel::Pluck => 1,
            Channel::Percussion => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Melody => "melody",
            Channel::Pluck => "pluck",
            Channel::Percussion => "percussion",
        }
    }
}

// ============================================================================
// EXTRACTED NOTES
// ============================================================================

/// The three index-aligned sequences produced from one image
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedNotes {
    pub melody: Vec<Note>,
    pub pluck: Vec<Note>,
    pub percussion: Vec<Note>,
}

impl ExtractedNotes {
    /// Builds sequences directly (mostly used by tests and callers that
    /// compose their own patterns)
    pub fn new(melody: Vec<Note>, pluck: Vec<Note>, percussion: Vec<Note>) -> Self {
        Self { melody, pluck, percussion }
    }

    /// Number of steps (length of the melody sequence)
    pub fn len(&self) -> usize {
        self.melody.len()
    }

    pub fn is_empty(&self) -> bool {
        self.melody.is_empty()
    }

    /// True when all three sequences have the same length
    pub fn is_aligned(&self) -> bool {
        self.melody.len() == self.pluck.len() && self.pluck.len() == self.percussion.len()
    }

    /// Borrow one channel's sequence
    pub fn channel(&self, channel: Channel) -> &[Note] {
        match channel {
            Channel::Melody => &self.melody,
            Channel::Pluck => &self.pluck,
            Channel::Percussion => &self.percussion,
        }
    }

    /// The three notes at one step, in trigger order
    pub fn notes_at(&self, index: usize) -> Option<[Note; 3]> {
        Some([
            *self.melody.get(index)?,
            *self.pluck.get(index)?,
            *self.percussion.get(index)?,
        ])
    }

    /// True when no channel has a single audible note
    pub fn is_silent(&self) -> bool {
        Channel::ALL
            .iter()
            .all(|channel| self.channel(*channel).iter().all(Note::is_rest))
    }
}

// ============================================================================
// PEAK SCAN
// ============================================================================

/// Brightest above-threshold pixel found so far in a band
#[derive(Clone, Copy, Debug, PartialEq)]
struct Peak {
    row: usize,
    intensity: u8,
}

impl Peak {
    /// Should a pixel at `row` with `intensity` replace the current peak?
    fn is_beaten_by(current: Option<Peak>, row: usize, intensity: u8) -> bool {
        if intensity <= INTENSITY_THRESHOLD {
            return false;
        }
        match current {
            None => true,
            Some(peak) => {
                intensity > peak.intensity || (intensity == peak.intensity && row < peak.row)
            }
        }
    }

    fn to_note(self, range: ChannelRange, height: usize) -> Note {
        Note {
            pitch: range.pitch_for_row(self.row, height),
            velocity: self.intensity as f32 / 255.0,
        }
    }
}

/// Scans columns [x_start, x_end) and returns the peak per channel
fn scan_band(pixels: &PixelBuffer, x_start: usize, x_end: usize) -> [Option<Peak>; 3] {
    let mut peaks: [Option<Peak>; 3] = [None; 3];

    for row in 0..pixels.height() as usize {
        for column in x_start..x_end {
            let rgba = pixels.pixel(column, row);

            for channel in Channel::ALL {
                let slot = channel.color_offset();
                let intensity = rgba[slot];
                if Peak::is_beaten_by(peaks[slot], row, intensity) {
                    peaks[slot] = Some(Peak { row, intensity });
                }
            }
        }
    }

    peaks
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extracts three note sequences of exactly `steps` notes from the pixels
pub fn extract(pixels: &PixelBuffer, steps: usize) -> ExtractedNotes {
    let width = pixels.width() as usize;
    let height = pixels.height() as usize;
    let band_width = (width / steps.max(1)).max(1);

    let mut notes = ExtractedNotes {
        melody: Vec::with_capacity(steps),
        pluck: Vec::with_capacity(steps),
        percussion: Vec::with_capacity(steps),
    };

    for step in 0..steps {
        let x_start = step * band_width;
        let x_end = if step + 1 == steps {
            width
        } else {
            (x_start + band_width).min(width)
        };

        let peaks = if x_start < x_end {
            scan_band(pixels, x_start, x_end)
        } else {
            [None; 3]
        };

        for channel in Channel::ALL {
            let note = peaks[channel.color_offset()]
                .map_or(Note::REST, |peak| peak.to_note(channel.range(), height));

            match channel {
                Channel::Melody => notes.melody.push(note),
                Channel::Pluck => notes.pluck.push(note),
                Channel::Percussion => notes.percussion.push(note),
            }
        }
    }

    log::debug!(
        "extracted {} steps from {}x{} image (band width {})",
        steps,
        width,
        height,
        band_width
    );

    notes
}

/// Convenience wrapper for an already decoded image
pub fn extract_from_image(image: &image::DynamicImage, steps: usize) -> ExtractedNotes {
    extract(&PixelBuffer::from_image(image), steps)
}

// ============================================================================
// UNIT TESTS
// ============================================================================
