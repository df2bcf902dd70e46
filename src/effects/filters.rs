// ============================================================================
// FILTERS.RS - Biquad Filters
// ============================================================================
//
// The three filter shapes the player needs:
// - Low-pass:  the tone filter on the master bus
// - High-pass: thins the hi-hat noise down to its sizzle
// - Band-pass: the moving wah peak
//
// All use the standard biquad (second-order IIR) topology with coefficients
// from the Audio EQ Cookbook.
// ============================================================================

use crate::helper::PI;

// ============================================================================
// BIQUAD COEFFICIENTS
// ============================================================================
//
// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
// All coefficients are stored already divided by a0.
// ============================================================================

/// Smallest Q handed to the coefficient math (Q = 0 would divide by zero)
///
/// At this floor a band-pass still passes the audible range at close to unity
/// and its slow pole settles within tens of milliseconds. Much smaller values
/// push that pole against z = 1 where f32 state drifts.
pub const MIN_Q: f32 = 1e-2;

/// Lowest frequency any filter is tuned to
pub const MIN_FREQUENCY_HZ: f32 = 20.0;

/// Highest frequency as a fraction of the sample rate (just under Nyquist)
pub const MAX_FREQUENCY_RATIO: f32 = 0.45;

/// Keeps a filter frequency inside [20 Hz, 0.45 * sample rate]
pub fn clamp_frequency(frequency_hz: f32, sample_rate: u32) -> f32 {
    let max = sample_rate as f32 * MAX_FREQUENCY_RATIO;
    if frequency_hz.is_nan() {
        return MIN_FREQUENCY_HZ;
    }
    frequency_hz.clamp(MIN_FREQUENCY_HZ, max.max(MIN_FREQUENCY_HZ))
}

/// Biquad filter coefficients
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

/// Shared cookbook prelude: (cos w0, alpha)
fn prelude(frequency_hz: f32, q: f32, sample_rate: u32) -> (f32, f32) {
    let frequency_hz = clamp_frequency(frequency_hz, sample_rate);
    let w0 = 2.0 * PI * frequency_hz / sample_rate as f32;
    let alpha = w0.sin() / (2.0 * q.max(MIN_Q));
    (w0.cos(), alpha)
}

impl BiquadCoefficients {
    /// Identity filter (output = input)
    pub fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate low-pass filter coefficients
    pub fn low_pass(cutoff_hz: f32, q: f32, sample_rate: u32) -> Self {
        let (cos_w0, alpha) = prelude(cutoff_hz, q, sample_rate);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;
        Self::normalized(b0, b1, b2, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// Calculate high-pass filter coefficients
    pub fn high_pass(cutoff_hz: f32, q: f32, sample_rate: u32) -> Self {
        let (cos_w0, alpha) = prelude(cutoff_hz, q, sample_rate);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;
        Self::normalized(b0, b1, b2, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// Calculate band-pass filter coefficients (0 dB peak gain)
    ///
    /// As Q shrinks toward zero the pass band widens until the filter is
    /// practically transparent.
    pub fn band_pass(center_hz: f32, q: f32, sample_rate: u32) -> Self {
        let (cos_w0, alpha) = prelude(center_hz, q, sample_rate);

        Self::normalized(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }
}

// ============================================================================
// BIQUAD STATE
// ============================================================================

/// Biquad filter state (delay line)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BiquadState {
    z1: f32, // z^-1 delay
    z2: f32, // z^-2 delay
}

impl BiquadState {
    pub fn new() -> Self {
        Self { z1: 0.0, z2: 0.0 }
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Process one sample through the filter (transposed direct form II)
    #[inline]
    pub fn process(&mut self, input: f32, coef: &BiquadCoefficients) -> f32 {
        let output = coef.b0 * input + self.z1;
        self.z1 = coef.b1 * input - coef.a1 * output + self.z2;
        self.z2 = coef.b2 * input - coef.a2 * output;
        output
    }
}

// ============================================================================
// BIQUAD FILTER
// ============================================================================
//
// Coefficients plus state, retuned only when frequency or Q actually move.
// ============================================================================

/// Which cookbook response a BiquadFilter uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
}

/// A single mono biquad with cached coefficients
#[derive(Clone, Debug)]
pub struct BiquadFilter {
    filter_type: FilterType,
    sample_rate: u32,
    coefficients: BiquadCoefficients,
    state: BiquadState,
    last_frequency: f32,
    last_q: f32,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, frequency_hz: f32, q: f32, sample_rate: u32) -> Self {
        let mut filter = Self {
            filter_type,
            sample_rate,
            coefficients: BiquadCoefficients::passthrough(),
            state: BiquadState::new(),
            last_frequency: f32::NAN,
            last_q: f32::NAN,
        };
        filter.tune(frequency_hz, q);
        filter
    }

    /// Recalculates coefficients if the parameters changed
    pub fn tune(&mut self, frequency_hz: f32, q: f32) {
        if frequency_hz == self.last_frequency && q == self.last_q {
            return;
        }
        self.coefficients = match self.filter_type {
            FilterType::LowPass => BiquadCoefficients::low_pass(frequency_hz, q, self.sample_rate),
            FilterType::HighPass => BiquadCoefficients::high_pass(frequency_hz, q, self.sample_rate),
            FilterType::BandPass => BiquadCoefficients::band_pass(frequency_hz, q, self.sample_rate),
        };
        self.last_frequency = frequency_hz;
        self.last_q = q;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state.process(input, &self.coefficients)
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
