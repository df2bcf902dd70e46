// ============================================================================
// DISTORTION.RS - Waveshaping Distortion
// ============================================================================
//
// The first stage of the chain. Every sample is pushed through a transfer
// curve stored as a lookup table:
//
//     f(x) = (PI + k) * x / (PI + k * |x|)      k = amount, 0..100
//
// - k = 0 gives f(x) = x, the stage is clean
// - larger k bends the curve harder toward +/-1 (more saturation)
// - f(-1) = -1 and f(1) = 1 for every k, so the output never leaves [-1, 1]
// - the curve is odd and strictly increasing
//
// Inputs outside [-1, 1] are clamped onto the ends of the table, so a hot
// signal hard-clips at the edge instead of wrapping.
// ============================================================================

use crate::helper::{lerp, PI};

/// Number of points in the lookup table (odd, so x = 0 sits on a point)
pub const CURVE_POINTS: usize = 8193;

/// Largest supported distortion amount
pub const MAX_AMOUNT: f32 = 100.0;

/// The waveshaper transfer function evaluated directly
#[inline]
pub fn shape(x: f32, amount: f32) -> f32 {
    (PI + amount) * x / (PI + amount * x.abs())
}

/// A precomputed transfer curve for one distortion amount
#[derive(Clone, Debug, PartialEq)]
pub struct WaveshaperCurve {
    amount: f32,
    table: Vec<f32>,
}

impl WaveshaperCurve {
    /// Builds the table for `amount` (clamped to 0..=100)
    pub fn new(amount: f32) -> Self {
        let amount = if amount.is_nan() { 0.0 } else { amount.clamp(0.0, MAX_AMOUNT) };
        let last = (CURVE_POINTS - 1) as f32;
        let table = (0..CURVE_POINTS)
            .map(|i| shape(-1.0 + 2.0 * i as f32 / last, amount))
            .collect();
        Self { amount, table }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// True when the curve leaves the signal untouched
    pub fn is_identity(&self) -> bool {
        self.amount == 0.0
    }

    /// Maps one sample through the table with linear interpolation
    #[inline]
    pub fn process(&self, input: f32) -> f32 {
        if input.is_nan() {
            return 0.0;
        }
        let x = input.clamp(-1.0, 1.0);
        let position = (x + 1.0) * 0.5 * (CURVE_POINTS - 1) as f32;
        let index = (position.floor() as usize).min(CURVE_POINTS - 2);
        let fraction = position - index as f32;
        lerp(self.table[index], self.table[index + 1], fraction)
    }
}

impl Default for WaveshaperCurve {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
