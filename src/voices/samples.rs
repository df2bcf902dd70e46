// ============================================================================
// SAMPLES.RS - Percussion Sample Synthesis
// ============================================================================
//
// The percussion voice plays two short buffers that are rendered once, up
// front, and then shared by every hit:
//
// LOW (kick):
//   A sine whose frequency falls from 67 Hz to a tenth of that, while its
//   amplitude falls from 1 to 0.01. Both envelopes move in log space (equal
//   ratios per unit time), which is what makes a kick sound like a thump
//   rather than a slide. The phase is accumulated sample by sample so the
//   pitch sweep stays continuous.
//
// HIGH (hi-hat):
//   White noise with a linear fade over its last 50 ms. The voice plays it
//   through a 6 kHz high-pass so only the sizzle remains.
// ============================================================================

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::SampleBuffer;
use crate::helper::{log_interpolation, TWO_PI};

/// Length of both percussion buffers
pub const DRUM_BUFFER_SECONDS: f32 = 0.3;

/// Kick starting frequency
pub const KICK_START_FREQUENCY_HZ: f32 = 67.0;

/// Kick frequency at the end, relative to the start
pub const KICK_PITCH_DECAY: f32 = 0.1;

/// Kick amplitude at the end
pub const KICK_AMPLITUDE_DECAY: f32 = 0.01;

/// Hi-hat fade-out length
pub const HIHAT_FADE_SECONDS: f32 = 0.05;

/// Seed used for the hi-hat noise unless a caller picks another
pub const DEFAULT_NOISE_SEED: u64 = 0x5eed;

fn buffer_length(seconds: f32, sample_rate: u32) -> usize {
    (seconds * sample_rate as f32).floor() as usize
}

/// Renders the kick buffer
pub fn kick_buffer(sample_rate: u32) -> SampleBuffer {
    let length = buffer_length(DRUM_BUFFER_SECONDS, sample_rate);
    let mut samples = Vec::with_capacity(length);
    let mut phase = 0.0_f32;

    for i in 0..length {
        let progress = i as f32 / length as f32;
        let frequency = KICK_START_FREQUENCY_HZ * log_interpolation(1.0, KICK_PITCH_DECAY, progress);
        let amplitude = log_interpolation(1.0, KICK_AMPLITUDE_DECAY, progress);

        phase += TWO_PI * frequency / sample_rate as f32;
        samples.push(phase.sin() * amplitude);
    }

    SampleBuffer::new(sample_rate, samples)
}

/// Renders the hi-hat buffer from the given random source
pub fn hihat_buffer<R: Rng>(sample_rate: u32, rng: &mut R) -> SampleBuffer {
    let length = buffer_length(DRUM_BUFFER_SECONDS, sample_rate);
    let fade_length = buffer_length(HIHAT_FADE_SECONDS, sample_rate).max(1);
    let fade_start = length.saturating_sub(fade_length);

    let samples = (0..length)
        .map(|i| {
            let noise: f32 = rng.random_range(-1.0..1.0);
            if i > fade_start {
                noise * (length - i) as f32 / fade_length as f32
            } else {
                noise
            }
        })
        .collect();

    SampleBuffer::new(sample_rate, samples)
}

/// The two shared percussion buffers
#[derive(Clone, Debug)]
pub struct DrumKit {
    pub low: Arc<SampleBuffer>,
    pub high: Arc<SampleBuffer>,
}

impl DrumKit {
    /// Renders both buffers; the same seed always gives the same hi-hat
    pub fn new(sample_rate: u32, noise_seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(noise_seed);
        Self {
            low: Arc::new(kick_buffer(sample_rate)),
            high: Arc::new(hihat_buffer(sample_rate, &mut rng)),
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_point_three_seconds() {
        let kit = DrumKit::new(48000, 1);
        assert_eq!(kit.low.len(), 14400);
        assert_eq!(kit.high.len(), 14400);
    }

    #[test]
    fn test_kick_decays() {
        let kick = kick_buffer(48000);
        let head = kick.samples()[..2400].iter().fold(0.0_f32, |a, s| a.max(s.abs()));
        let tail = kick.samples()[12000..].iter().fold(0.0_f32, |a, s| a.max(s.abs()));
        assert!(head > 0.5);
        assert!(tail < 0.03);
        assert!(kick.samples().iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_hihat_fades_to_silence() {
        let mut rng = StdRng::seed_from_u64(7);
        let hat = hihat_buffer(48000, &mut rng);
        let last = *hat.samples().last().unwrap();
        assert!(last.abs() <= 1.0 / 2400.0 + 1e-6);
        assert!(hat.samples().iter().all(|s| s.abs() <= 1.0));
        // Plenty of energy before the fade
        let body: f32 = hat.samples()[..4800].iter().map(|s| s * s).sum::<f32>() / 4800.0;
        assert!(body > 0.2);
    }

    #[test]
    fn test_same_seed_same_noise() {
        let a = DrumKit::new(44100, 42);
        let b = DrumKit::new(44100, 42);
        let c = DrumKit::new(44100, 43);
        assert_eq!(a.high, b.high);
        assert_ne!(a.high, c.high);
        assert_eq!(a.low, c.low);
    }
}
