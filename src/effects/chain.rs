// ============================================================================
// CHAIN.RS - The Shared Effects Chain
// ============================================================================
//
// Every voice in the player feeds one bus:
//
//     voices -> Distortion -> Wah -> Tone (low-pass) -> Master gain -> out
//
// The chain lives in two halves:
//
// - ChainProcessor (render side): owns the filter state and the parameter
//   timelines, and turns the summed voice signal into output samples.
// - SignalChain (control side): remembers the last settings and mood, and
//   turns them into smoothed parameter events sent through an AudioBackend.
//
// SMOOTHING:
// - volume, wah depth, wah Q: exponential approach, time constant 0.1 s
// - brightness (gain), saturation (tone cutoff): 100 ms linear ramps
// Every write to a chain parameter first cancels whatever was still pending
// on it and holds the current value, so the most recent write governs. The
// volume and brightness paths both land on the master gain this way.
// ============================================================================

use std::sync::Arc;

use super::distortion::WaveshaperCurve;
use super::filters::{clamp_frequency, BiquadFilter, FilterType};
use super::wah::{depth_hz_for_amount, q_for_amount, WahStage};
use crate::analysis::VisualMetrics;
use crate::audio::backend::{AudioBackend, BackendResult, ChainParam};
use crate::audio::param::{AudioParam, ParamEvent};
use crate::config::EffectSettings;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Master gain before any settings or mood arrive
pub const INITIAL_MASTER_GAIN: f32 = 0.5;

/// Tone filter cutoff before any mood arrives (fully open)
pub const INITIAL_TONE_CUTOFF_HZ: f32 = 20000.0;

/// Tone filter resonance
pub const TONE_Q: f32 = 1.0;

/// Time constant for volume and wah changes
pub const SETTINGS_TIME_CONSTANT: f64 = 0.1;

/// Ramp length for mood-driven changes
pub const MOOD_RAMP_SECONDS: f64 = 0.1;

/// Master gain for a brightness in [0, 1]: 0.1 (dark) to 1.0 (bright)
pub fn gain_for_brightness(brightness: f32) -> f32 {
    0.1 + brightness * 0.9
}

/// Tone cutoff for a saturation in [0, 1]: 1 kHz (dull) to 20 kHz (vivid)
pub fn cutoff_for_saturation(saturation: f32) -> f32 {
    1000.0 + saturation * 19000.0
}

// ============================================================================
// RENDER SIDE
// ============================================================================

/// Sample-level processing for the chain
#[derive(Clone, Debug)]
pub struct ChainProcessor {
    sample_rate: u32,
    curve: Arc<WaveshaperCurve>,
    wah: WahStage,
    tone: BiquadFilter,
    tone_cutoff: AudioParam,
    master_gain: AudioParam,
}

impl ChainProcessor {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            curve: Arc::new(WaveshaperCurve::default()),
            wah: WahStage::new(sample_rate),
            tone: BiquadFilter::new(FilterType::LowPass, INITIAL_TONE_CUTOFF_HZ, TONE_Q, sample_rate),
            tone_cutoff: AudioParam::new(INITIAL_TONE_CUTOFF_HZ),
            master_gain: AudioParam::new(INITIAL_MASTER_GAIN),
        }
    }

    /// Routes an automation event to the right stage
    pub fn automate(&mut self, param: ChainParam, event: ParamEvent, now: f64) {
        match param {
            ChainParam::MasterGain => self.master_gain.schedule(event, now),
            ChainParam::ToneCutoff => self.tone_cutoff.schedule(event, now),
            ChainParam::WahDepth => self.wah.automate_depth(event, now),
            ChainParam::WahQ => self.wah.automate_q(event, now),
        }
    }

    pub fn set_curve(&mut self, curve: Arc<WaveshaperCurve>) {
        self.curve = curve;
    }

    pub fn curve(&self) -> &WaveshaperCurve {
        &self.curve
    }

    /// Master gain as seen at time `t`
    pub fn master_gain_at(&self, t: f64) -> f32 {
        self.master_gain.value_at(t)
    }

    /// Tone cutoff as seen at time `t`
    pub fn tone_cutoff_at(&self, t: f64) -> f32 {
        self.tone_cutoff.value_at(t)
    }

    /// Wah (depth_hz, q) as seen at time `t`
    pub fn wah_at(&self, t: f64) -> (f32, f32) {
        self.wah.parameters_at(t)
    }

    /// Runs one summed voice sample through every stage
    #[inline]
    pub fn process(&mut self, input: f32, t: f64) -> f32 {
        let shaped = self.curve.process(input);
        let wah = self.wah.process(shaped, t);

        let cutoff = clamp_frequency(self.tone_cutoff.value_at(t), self.sample_rate);
        self.tone.tune(cutoff, TONE_Q);
        let toned = self.tone.process(wah);

        toned * self.master_gain.value_at(t)
    }

    /// Folds finished automation into the base values
    pub fn prune(&mut self, now: f64) {
        self.wah.prune(now);
        self.tone_cutoff.prune(now);
        self.master_gain.prune(now);
    }
}

// ============================================================================
// CONTROL SIDE
// ============================================================================

/// Turns settings and mood into smoothed chain automation
#[derive(Clone, Debug, Default)]
pub struct SignalChain {
    /// Amount of the curve currently installed (None until the first apply)
    installed_distortion: Option<f32>,

    /// Last settings applied, already clamped
    settings: EffectSettings,

    /// Last mood applied
    metrics: VisualMetrics,
}

impl SignalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    pub fn metrics(&self) -> VisualMetrics {
        self.metrics
    }

    /// Applies user settings: volume, distortion, wah depth and Q
    ///
    /// Out-of-range values are clamped first. The distortion curve is only
    /// rebuilt when the amount actually changed.
    pub fn apply_settings(&mut self, backend: &dyn AudioBackend, settings: &EffectSettings) {
        let settings = settings.clamped();
        let now = backend.current_time();

        log_failure(
            "volume",
            approach(backend, ChainParam::MasterGain, settings.volume, now),
        );

        if self.installed_distortion != Some(settings.distortion_amount) {
            let curve = Arc::new(WaveshaperCurve::new(settings.distortion_amount));
            log_failure("distortion", backend.set_distortion_curve(curve));
            self.installed_distortion = Some(settings.distortion_amount);
            log::debug!("distortion curve rebuilt for amount {}", settings.distortion_amount);
        }

        log_failure(
            "wah depth",
            approach(backend, ChainParam::WahDepth, depth_hz_for_amount(settings.wah_depth), now),
        );
        log_failure(
            "wah q",
            approach(backend, ChainParam::WahQ, q_for_amount(settings.wah_depth), now),
        );

        log::debug!(
            "settings applied: volume {:.2}, distortion {:.0}, wah {:.0}, style {}",
            settings.volume,
            settings.distortion_amount,
            settings.wah_depth,
            settings.style
        );
        self.settings = settings;
    }

    /// Applies image mood: brightness to master gain, saturation to tone
    pub fn apply_visual_metrics(&mut self, backend: &dyn AudioBackend, metrics: VisualMetrics) {
        let metrics = VisualMetrics::new(metrics.saturation, metrics.brightness);
        let now = backend.current_time();

        log_failure(
            "brightness",
            ramp(backend, ChainParam::MasterGain, gain_for_brightness(metrics.brightness), now),
        );
        log_failure(
            "saturation",
            ramp(backend, ChainParam::ToneCutoff, cutoff_for_saturation(metrics.saturation), now),
        );

        log::debug!(
            "mood applied: saturation {:.2}, brightness {:.2}",
            metrics.saturation,
            metrics.brightness
        );
        self.metrics = metrics;
    }
}

/// Cancel-and-hold, then an exponential approach toward `target`
fn approach(backend: &dyn AudioBackend, param: ChainParam, target: f32, now: f64) -> BackendResult {
    backend.automate_chain(param, ParamEvent::CancelAndHold { time: now })?;
    backend.automate_chain(
        param,
        ParamEvent::SetTargetAt {
            target,
            start_time: now,
            time_constant: SETTINGS_TIME_CONSTANT,
        },
    )
}

/// Cancel-and-hold, then a linear ramp reaching `value` after 100 ms
fn ramp(backend: &dyn AudioBackend, param: ChainParam, value: f32, now: f64) -> BackendResult {
    backend.automate_chain(param, ParamEvent::CancelAndHold { time: now })?;
    backend.automate_chain(
        param,
        ParamEvent::LinearRampTo {
            value,
            end_time: now + MOOD_RAMP_SECONDS,
        },
    )
}

fn log_failure(what: &str, result: BackendResult) {
    if let Err(e) = result {
        log::warn!("could not update {}: {}", what, e);
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
