// ============================================================================
// HELPER.RS - Pitch and Interpolation Math
// ============================================================================
//
// Small numeric helpers shared by the analysis, voices and effects code.
//
// CONTENTS:
// - Mathematical interpolation functions (lerp, log-space sweeps, exponential
//   approach used by parameter smoothing)
// - Pitch-to-frequency conversion for MIDI-style note numbers
// - PolyBLEP correction for the band-limited oscillators
// ============================================================================

pub use std::f32::consts::PI;

// ============================================================================
// CONSTANTS
// ============================================================================

/// One full oscillator cycle in radians
pub const TWO_PI: f32 = 2.0 * PI;

/// Concert pitch
pub const A4_FREQUENCY_HZ: f32 = 440.0;

/// Note number of concert A
pub const A4_MIDI_NOTE: i32 = 69;

// ============================================================================
// PITCH CONVERSION
// ============================================================================

/// Converts a MIDI-style note number to its frequency in Hz
///
/// Formula: f = 440 * 2^((n - 69) / 12)
pub fn midi_to_frequency(midi_note: u8) -> f32 {
    let semitones_from_a4 = midi_note as i32 - A4_MIDI_NOTE;
    A4_FREQUENCY_HZ * 2.0_f32.powf(semitones_from_a4 as f32 / 12.0)
}

// ============================================================================
// INTERPOLATION
// ============================================================================
//
// Envelopes, sweeps and parameter smoothing all go through these.
// ============================================================================

/// Straight-line blend, `progress` 0 gives `start_value`
#[inline]
pub fn lerp(start_value: f32, end_value: f32, progress: f32) -> f32 {
    start_value + (end_value - start_value) * progress
}

/// Interpolates in log space, like numpy's `logspace`
/// Both endpoints must be positive.
///
/// Formula: result = 10^(log10(start) + (log10(end) - log10(start)) * progress)
#[inline]
pub fn log_interpolation(start_value: f32, end_value: f32, progress: f32) -> f32 {
    let log_start = start_value.log10();
    let log_end = end_value.log10();
    10.0_f32.powf(log_start + (log_end - log_start) * progress)
}

/// Exponential approach toward a target (first-order lag)
///
/// After `elapsed` seconds a value that started at `start_value` has covered
/// `1 - e^(-elapsed / time_constant)` of the distance to `target_value`.
#[inline]
pub fn exponential_approach(start_value: f32, target_value: f32, elapsed: f64, time_constant: f64) -> f32 {
    if time_constant <= 0.0 {
        return target_value;
    }
    let remaining = (-elapsed / time_constant).exp() as f32;
    target_value + (start_value - target_value) * remaining
}

// ============================================================================
// ANTI-ALIASING
// ============================================================================

/// PolyBLEP residual for a normalized phase (0 to 1)
///
/// Square and sawtooth waves have sharp edges that alias. Adding this
/// polynomial near each discontinuity rounds the step off.
#[inline]
pub fn polyblep(mut phase: f32, phase_increment: f32) -> f32 {
    if phase < phase_increment {
        // Just after a discontinuity: 2t - t^2 - 1
        phase /= phase_increment;
        return phase + phase - phase * phase - 1.0;
    } else if phase > 1.0 - phase_increment {
        // Just before a discontinuity: t^2 + 2t + 1
        phase = (phase - 1.0) / phase_increment;
        return phase * phase + phase + phase + 1.0;
    }
    0.0
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_frequency_a4() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 0.01);
        assert!((midi_to_frequency(81) - 880.0).abs() < 0.01);
        assert!((midi_to_frequency(60) - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, 10.0, 0.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 1.0), 10.0);
        assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
    }

    #[test]
    fn test_log_interpolation_endpoints() {
        assert!((log_interpolation(1.0, 0.1, 0.0) - 1.0).abs() < 1e-6);
        assert!((log_interpolation(1.0, 0.1, 1.0) - 0.1).abs() < 1e-6);
        // Halfway in log space is the geometric mean
        assert!((log_interpolation(1.0, 0.01, 0.5) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_exponential_approach() {
        assert_eq!(exponential_approach(0.0, 1.0, 0.0, 0.1), 0.0);
        let one_tau = exponential_approach(0.0, 1.0, 0.1, 0.1);
        assert!((one_tau - 0.632).abs() < 0.001);
        assert!((exponential_approach(0.0, 1.0, 5.0, 0.1) - 1.0).abs() < 1e-6);
        assert_eq!(exponential_approach(0.3, 0.7, 1.0, 0.0), 0.7);
    }

    #[test]
    fn test_polyblep_is_zero_away_from_edges() {
        assert_eq!(polyblep(0.5, 0.01), 0.0);
        assert!(polyblep(0.001, 0.01) < 0.0);
        assert!(polyblep(0.999, 0.01) > 0.0);
    }
}
