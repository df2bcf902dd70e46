// ============================================================================
// WAH.RS - LFO-Swept Band-Pass
// ============================================================================
//
// A band-pass filter whose center frequency is pushed up and down by a slow
// sine LFO:
//
//     center = 1000 Hz + sin(2 PI * 2.5 Hz * t) * depth_hz
//
// depth_hz is 0..2000 (wah amount 0..100 scaled by 20). With depth 0 the
// filter sits still at 1000 Hz, and the control side also pulls Q toward 0
// so the band opens up and the stage is effectively bypassed.
// ============================================================================

use super::filters::{clamp_frequency, BiquadFilter, FilterType};
use crate::audio::param::{AudioParam, ParamEvent};
use crate::helper::TWO_PI;

/// Resting center frequency of the wah peak
pub const WAH_BASE_FREQUENCY_HZ: f32 = 1000.0;

/// LFO speed
pub const WAH_LFO_RATE_HZ: f32 = 2.5;

/// Sweep width in Hz at wah amount 100
pub const WAH_MAX_DEPTH_HZ: f32 = 2000.0;

/// Q while the wah is engaged
pub const WAH_ACTIVE_Q: f32 = 5.0;

/// Converts a 0..100 wah amount to the LFO depth in Hz
pub fn depth_hz_for_amount(amount: f32) -> f32 {
    amount / 100.0 * WAH_MAX_DEPTH_HZ
}

/// Q the control side aims for at a given wah amount
pub fn q_for_amount(amount: f32) -> f32 {
    if amount == 0.0 { 0.0 } else { WAH_ACTIVE_Q }
}

/// Advance LFO phase
#[inline]
fn advance_phase(phase: &mut f32, rate_hz: f32, sample_rate: u32) {
    *phase += rate_hz / sample_rate as f32;
    if *phase >= 1.0 {
        *phase -= 1.0;
    }
}

/// The wah stage of the chain
#[derive(Clone, Debug)]
pub struct WahStage {
    sample_rate: u32,
    lfo_phase: f32,
    depth_hz: AudioParam,
    q: AudioParam,
    filter: BiquadFilter,
}

impl WahStage {
    /// Starts disengaged: no sweep and an open band
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            lfo_phase: 0.0,
            depth_hz: AudioParam::new(0.0),
            q: AudioParam::new(0.0),
            filter: BiquadFilter::new(FilterType::BandPass, WAH_BASE_FREQUENCY_HZ, 0.0, sample_rate),
        }
    }

    pub fn automate_depth(&mut self, event: ParamEvent, now: f64) {
        self.depth_hz.schedule(event, now);
    }

    pub fn automate_q(&mut self, event: ParamEvent, now: f64) {
        self.q.schedule(event, now);
    }

    /// Current (depth_hz, q) as seen at time `t`
    pub fn parameters_at(&self, t: f64) -> (f32, f32) {
        (self.depth_hz.value_at(t), self.q.value_at(t))
    }

    /// Filters one sample at clock time `t`
    #[inline]
    pub fn process(&mut self, input: f32, t: f64) -> f32 {
        let lfo = (self.lfo_phase * TWO_PI).sin();
        advance_phase(&mut self.lfo_phase, WAH_LFO_RATE_HZ, self.sample_rate);

        let (depth_hz, q) = self.parameters_at(t);
        let center = clamp_frequency(WAH_BASE_FREQUENCY_HZ + lfo * depth_hz, self.sample_rate);
        self.filter.tune(center, q);
        self.filter.process(input)
    }

    pub fn prune(&mut self, now: f64) {
        self.depth_hz.prune(now);
        self.q.prune(now);
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
