// ============================================================================
// PERCUSSION.RS - Kick and Hi-Hat
// ============================================================================
//
// The blue channel. Pitch does not pick a note here, it picks a SOUND:
//
//     pitch <= 42  -> low  (kick buffer, gain 0.6 * velocity)
//     pitch >  42  -> high (hi-hat buffer through a 6 kHz high-pass,
//                           gain 0.2 * velocity)
//
// Every hit is its own node:
//
//     0 ms     gain 0.001
//     5 ms     full gain        (linear attack)
//     200 ms   gain 0.0001      (linear release)
//     250 ms   node stops
// ============================================================================

use super::{DrumKit, NodeTracker, TriggerContext, Voice, RELEASE_FLOOR, START_GAIN};
use crate::analysis::{Channel, Note};
use crate::audio::{AudioBackend, BackendResult, ParamEvent, SourceKind};

/// Highest pitch that still plays the low sound
pub const LOW_SOUND_MAX_PITCH: u8 = 42;

/// High-pass cutoff applied to the hi-hat
pub const HIHAT_HIGHPASS_HZ: f32 = 6000.0;

pub const PERCUSSION_ATTACK_SECONDS: f64 = 0.005;
pub const PERCUSSION_RELEASE_END_SECONDS: f64 = 0.2;
pub const PERCUSSION_STOP_SECONDS: f64 = 0.25;

/// The two percussion timbres
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrumSound {
    Low,
    High,
}

impl DrumSound {
    /// Picks the sound for a percussion pitch
    pub fn for_pitch(pitch: u8) -> Self {
        if pitch > LOW_SOUND_MAX_PITCH {
            DrumSound::High
        } else {
            DrumSound::Low
        }
    }

    /// Peak gain per unit velocity
    pub fn peak_gain(&self) -> f32 {
        match self {
            DrumSound::Low => 0.6,
            DrumSound::High => 0.2,
        }
    }
}

/// The sample-based percussion voice
#[derive(Debug)]
pub struct PercussionVoice {
    kit: DrumKit,
    nodes: NodeTracker,
}

impl PercussionVoice {
    pub fn new(kit: DrumKit) -> Self {
        Self {
            kit,
            nodes: NodeTracker::new(),
        }
    }

    fn source_for(&self, sound: DrumSound) -> SourceKind {
        match sound {
            DrumSound::Low => SourceKind::Sample {
                buffer: self.kit.low.clone(),
                highpass_hz: None,
            },
            DrumSound::High => SourceKind::Sample {
                buffer: self.kit.high.clone(),
                highpass_hz: Some(HIHAT_HIGHPASS_HZ),
            },
        }
    }
}

impl Voice for PercussionVoice {
    fn channel(&self) -> Channel {
        Channel::Percussion
    }

    fn trigger(&mut self, note: Note, ctx: &TriggerContext<'_>) -> BackendResult {
        self.nodes.forget_ended(ctx.time);
        if note.is_rest() {
            return Ok(());
        }

        let sound = DrumSound::for_pitch(note.pitch);
        let backend = ctx.backend;
        let t = ctx.time;

        let node = backend.create_voice(self.source_for(sound), START_GAIN, t)?;
        self.nodes.track(node, t + PERCUSSION_STOP_SECONDS);

        backend.automate_gain(node, ParamEvent::SetValueAt { value: START_GAIN, time: t })?;
        backend.automate_gain(
            node,
            ParamEvent::LinearRampTo {
                value: sound.peak_gain() * note.velocity,
                end_time: t + PERCUSSION_ATTACK_SECONDS,
            },
        )?;
        backend.automate_gain(
            node,
            ParamEvent::LinearRampTo {
                value: RELEASE_FLOOR,
                end_time: t + PERCUSSION_RELEASE_END_SECONDS,
            },
        )?;
        backend.stop_voice(node, t + PERCUSSION_STOP_SECONDS)?;

        log::trace!("percussion: {:?} (pitch {}) node {}", sound, note.pitch, node);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{BackendOp, RecordingBackend};

    fn voice() -> PercussionVoice {
        PercussionVoice::new(DrumKit::new(8000, 1))
    }

    fn created_highpass(backend: &RecordingBackend) -> Vec<Option<f32>> {
        backend
            .voices_created()
            .into_iter()
            .filter_map(|op| match op {
                BackendOp::CreateVoice { source: SourceKind::Sample { highpass_hz, .. }, .. } => {
                    Some(highpass_hz)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pitch_threshold_picks_sound() {
        assert_eq!(DrumSound::for_pitch(42), DrumSound::Low);
        assert_eq!(DrumSound::for_pitch(43), DrumSound::High);
        assert_eq!(DrumSound::for_pitch(36), DrumSound::Low);
        assert_eq!(DrumSound::for_pitch(48), DrumSound::High);
    }

    #[test]
    fn test_low_and_high_hits() {
        let backend = RecordingBackend::default();
        let mut voice = voice();
        let ctx = TriggerContext { backend: &backend, time: 0.0, effective_duration: 0.5 };
        voice.trigger(Note::new(42, 1.0), &ctx).unwrap();
        voice.trigger(Note::new(43, 1.0), &ctx).unwrap();

        assert_eq!(created_highpass(&backend), vec![None, Some(HIHAT_HIGHPASS_HZ)]);
        assert_eq!(
            backend.gain_events(1)[1],
            ParamEvent::LinearRampTo { value: 0.6, end_time: 0.005 }
        );
        assert_eq!(
            backend.gain_events(2)[1],
            ParamEvent::LinearRampTo { value: 0.2, end_time: 0.005 }
        );
    }

    #[test]
    fn test_hit_envelope_and_stop() {
        let backend = RecordingBackend::default();
        let mut voice = voice();
        let ctx = TriggerContext { backend: &backend, time: 2.0, effective_duration: 0.5 };
        voice.trigger(Note::new(38, 0.5), &ctx).unwrap();

        let events = backend.gain_events(1);
        assert_eq!(events[0], ParamEvent::SetValueAt { value: START_GAIN, time: 2.0 });
        assert_eq!(
            events[2],
            ParamEvent::LinearRampTo { value: RELEASE_FLOOR, end_time: 2.0 + 0.2 }
        );
        assert_eq!(
            backend.count(|op| matches!(op, BackendOp::StopVoice { node: 1, at } if (*at - 2.25).abs() < 1e-9)),
            1
        );
    }

    #[test]
    fn test_rest_plays_nothing() {
        let backend = RecordingBackend::default();
        let mut voice = voice();
        let ctx = TriggerContext { backend: &backend, time: 0.0, effective_duration: 0.5 };
        voice.trigger(Note::REST, &ctx).unwrap();
        assert!(backend.voices_created().is_empty());
    }

    #[test]
    fn test_finished_hits_are_not_detached_on_silence() {
        let backend = RecordingBackend::default();
        let mut voice = voice();
        let ctx = TriggerContext { backend: &backend, time: 0.0, effective_duration: 0.5 };
        voice.trigger(Note::new(40, 1.0), &ctx).unwrap();

        backend.set_time(1.0);
        voice.silence(&backend);
        assert_eq!(backend.count(|op| matches!(op, BackendOp::DetachVoice { .. })), 0);
    }
}
