// ============================================================================
// PLUCK.RS - Square-Wave Plucks
// ============================================================================
//
// The green channel. Every audible step gets its own short node, there is no
// holding across steps:
//
//     0 ms     gain 0.001
//     20 ms    gain 0.3 * velocity     (linear attack)
//     150 ms   gain 0.0001             (linear decay)
//     200 ms   node stops
// ============================================================================

use super::{NodeTracker, TriggerContext, Voice, RELEASE_FLOOR, START_GAIN, TONAL_PEAK_GAIN};
use crate::analysis::{Channel, Note};
use crate::audio::{AudioBackend, BackendResult, ParamEvent, SourceKind, Waveform};
use crate::helper::midi_to_frequency;

/// Time from trigger to the top of the attack
pub const PLUCK_ATTACK_SECONDS: f64 = 0.02;

/// Time from trigger to the end of the decay
pub const PLUCK_DECAY_END_SECONDS: f64 = 0.15;

/// Time from trigger to the node stopping
pub const PLUCK_STOP_SECONDS: f64 = 0.2;

/// The one-shot pluck voice
#[derive(Debug, Default)]
pub struct PluckVoice {
    nodes: NodeTracker,
}

impl PluckVoice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Voice for PluckVoice {
    fn channel(&self) -> Channel {
        Channel::Pluck
    }

    fn trigger(&mut self, note: Note, ctx: &TriggerContext<'_>) -> BackendResult {
        self.nodes.forget_ended(ctx.time);
        if note.is_rest() {
            return Ok(());
        }

        let backend = ctx.backend;
        let t = ctx.time;
        let node = backend.create_voice(
            SourceKind::Oscillator {
                waveform: Waveform::Square,
                frequency_hz: midi_to_frequency(note.pitch),
            },
            START_GAIN,
            t,
        )?;
        self.nodes.track(node, t + PLUCK_STOP_SECONDS);

        backend.automate_gain(node, ParamEvent::SetValueAt { value: START_GAIN, time: t })?;
        backend.automate_gain(
            node,
            ParamEvent::LinearRampTo {
                value: TONAL_PEAK_GAIN * note.velocity,
                end_time: t + PLUCK_ATTACK_SECONDS,
            },
        )?;
        backend.automate_gain(
            node,
            ParamEvent::LinearRampTo {
                value: RELEASE_FLOOR,
                end_time: t + PLUCK_DECAY_END_SECONDS,
            },
        )?;
        backend.stop_voice(node, t + PLUCK_STOP_SECONDS)?;

        log::trace!("pluck: pitch {} node {}", note.pitch, node);
        Ok(())
    }

    fn silence(&mut self, backend: &dyn AudioBackend) {
        let now = backend.current_time();
        self.nodes.detach_all(backend, now);
    }

    fn sounding(&self, now: f64) -> usize {
        self.nodes.sounding(now)
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
