// ============================================================================
// MELODY.RS - Legato Sawtooth Lead
// ============================================================================
//
// The red channel. Only one melody note sounds at a time, and a run of the
// same pitch is played as ONE held note rather than a row of re-attacks.
//
// PER STEP:
// - same pitch as the held note (and not a rest): just extend the held
//   duration, nothing is scheduled
// - anything else: release the held note first (50 ms linear fade to
//   0.0001, then stop), then, unless it is a rest, start the new note:
//   gain 0.001 -> 0.3 * velocity over a 50 ms linear attack
//
// LegatoState is cleared on every rest, every pitch change and on silence().
// ============================================================================

use super::{
    release, NodeTracker, TriggerContext, Voice, RELEASE_FLOOR, START_GAIN, TONAL_PEAK_GAIN,
};
use crate::analysis::{Channel, Note};
use crate::audio::{AudioBackend, BackendResult, NodeId, ParamEvent, SourceKind, Waveform};
use crate::helper::midi_to_frequency;

/// Attack length of a new melody note
pub const MELODY_ATTACK_SECONDS: f64 = 0.05;

/// Release length when a held note is let go
pub const MELODY_RELEASE_SECONDS: f64 = 0.05;

/// What the melody voice is currently holding
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LegatoState {
    /// Pitch being held, 0 when nothing is
    pub current_pitch: u8,

    /// How long the held note has lasted so far, in seconds
    pub current_duration: f64,

    /// Node of the held note
    pub active_voice: Option<NodeId>,
}

/// The legato melody voice
#[derive(Debug, Default)]
pub struct MelodyVoice {
    legato: LegatoState,
    fading: NodeTracker,
}

impl MelodyVoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legato(&self) -> &LegatoState {
        &self.legato
    }

    /// Releases the held note (if any) and clears the legato state
    ///
    /// Returns the released node and the time its fade ends.
    fn let_go(&mut self, backend: &dyn AudioBackend, now: f64) -> Option<(NodeId, f64)> {
        let released = self.legato.active_voice.take().and_then(|node| {
            match release(backend, node, now, MELODY_RELEASE_SECONDS) {
                Ok(end) => Some((node, end)),
                Err(e) => {
                    log::warn!("melody release failed: {}", e);
                    None
                }
            }
        });
        self.legato = LegatoState::default();
        released
    }

    fn start_note(&mut self, note: Note, ctx: &TriggerContext<'_>) -> BackendResult {
        let backend = ctx.backend;
        let node = backend.create_voice(
            SourceKind::Oscillator {
                waveform: Waveform::Sawtooth,
                frequency_hz: midi_to_frequency(note.pitch),
            },
            START_GAIN,
            ctx.time,
        )?;

        // Hold the node before wiring the envelope so a failure below still
        // gets released on the next step or on silence()
        self.legato = LegatoState {
            current_pitch: note.pitch,
            current_duration: ctx.effective_duration,
            active_voice: Some(node),
        };

        backend.automate_gain(node, ParamEvent::SetValueAt { value: START_GAIN, time: ctx.time })?;
        backend.automate_gain(
            node,
            ParamEvent::LinearRampTo {
                value: TONAL_PEAK_GAIN * note.velocity,
                end_time: ctx.time + MELODY_ATTACK_SECONDS,
            },
        )?;

        log::trace!("melody on: pitch {} node {}", note.pitch, node);
        Ok(())
    }
}

impl Voice for MelodyVoice {
    fn channel(&self) -> Channel {
        Channel::Melody
    }

    fn trigger(&mut self, note: Note, ctx: &TriggerContext<'_>) -> BackendResult {
        self.fading.forget_ended(ctx.time);

        let rest = note.is_rest();
        if !rest && note.pitch == self.legato.current_pitch && self.legato.active_voice.is_some() {
            self.legato.current_duration += ctx.effective_duration;
            return Ok(());
        }

        if let Some((node, end)) = self.let_go(ctx.backend, ctx.time) {
            self.fading.track(node, end);
        }

        if rest {
            return Ok(());
        }
        self.start_note(note, ctx)
    }

    fn silence(&mut self, backend: &dyn AudioBackend) {
        let now = backend.current_time();
        self.fading.detach_all(backend, now);

        // The held note gets its normal fade; the backend tears it down
        if let Some((node, end)) = self.let_go(backend, now) {
            log::trace!("melody node {} fading to {} until {:.3}", node, RELEASE_FLOOR, end);
        }
    }

    fn finish(&mut self, backend: &dyn AudioBackend) {
        let now = backend.current_time();
        self.fading.forget_ended(now);
        if let Some((node, end)) = self.let_go(backend, now) {
            self.fading.track(node, end);
        }
    }

    fn sounding(&self, now: f64) -> usize {
        self.fading.sounding(now) + usize::from(self.legato.active_voice.is_some())
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{BackendOp, RecordingBackend};

    fn play(voice: &mut MelodyVoice, backend: &RecordingBackend, pitches: &[u8], step: f64) {
        for (i, pitch) in pitches.iter().enumerate() {
            let time = i as f64 * step;
            backend.set_time(time);
            let note = if *pitch == 0 { Note::REST } else { Note::new(*pitch, 1.0) };
            let ctx = TriggerContext {
                backend,
                time,
                effective_duration: step,
            };
            voice.trigger(note, &ctx).unwrap();
        }
    }

    #[test]
    fn test_legato_holds_repeated_pitch() {
        let backend = RecordingBackend::default();
        let mut voice = MelodyVoice::new();
        play(&mut voice, &backend, &[60, 60, 60, 0, 64], 0.5);

        let ops = backend.operations();
        let creates: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, BackendOp::CreateVoice { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(creates.len(), 2);

        // The first note's stop is scheduled before the second note exists
        let first_stop = ops
            .iter()
            .position(|op| matches!(op, BackendOp::StopVoice { node: 1, .. }))
            .unwrap();
        assert!(first_stop < creates[1]);

        // ...and the fade finishes before the 64 starts sounding
        match (&ops[first_stop], &ops[creates[1]]) {
            (BackendOp::StopVoice { at, .. }, BackendOp::CreateVoice { start_time, .. }) => {
                assert!(*at <= *start_time);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_duration_accumulates_while_held() {
        let backend = RecordingBackend::default();
        let mut voice = MelodyVoice::new();
        play(&mut voice, &backend, &[62, 62, 62], 0.25);
        assert_eq!(voice.legato().current_pitch, 62);
        assert!((voice.legato().current_duration - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_pitch_change_releases_and_restarts() {
        let backend = RecordingBackend::default();
        let mut voice = MelodyVoice::new();
        play(&mut voice, &backend, &[60, 67], 0.5);

        assert_eq!(backend.voices_created().len(), 2);
        assert_eq!(
            backend.gain_events(1)[2..],
            [
                ParamEvent::CancelAndHold { time: 0.5 },
                ParamEvent::LinearRampTo { value: RELEASE_FLOOR, end_time: 0.55 },
            ]
        );
        assert_eq!(voice.legato().current_pitch, 67);
    }

    #[test]
    fn test_attack_envelope() {
        let backend = RecordingBackend::default();
        let mut voice = MelodyVoice::new();
        backend.set_time(2.0);
        let ctx = TriggerContext { backend: &backend, time: 2.0, effective_duration: 0.5 };
        voice.trigger(Note::new(69, 0.5), &ctx).unwrap();

        match &backend.voices_created()[0] {
            BackendOp::CreateVoice { source, initial_gain, start_time, .. } => {
                assert_eq!(
                    *source,
                    SourceKind::Oscillator { waveform: Waveform::Sawtooth, frequency_hz: 440.0 }
                );
                assert_eq!(*initial_gain, START_GAIN);
                assert_eq!(*start_time, 2.0);
            }
            _ => unreachable!(),
        }
        assert_eq!(
            backend.gain_events(1),
            vec![
                ParamEvent::SetValueAt { value: START_GAIN, time: 2.0 },
                ParamEvent::LinearRampTo { value: 0.15, end_time: 2.05 },
            ]
        );
    }

    #[test]
    fn test_quiet_note_counts_as_rest() {
        let backend = RecordingBackend::default();
        let mut voice = MelodyVoice::new();
        let ctx = TriggerContext { backend: &backend, time: 0.0, effective_duration: 0.5 };
        voice.trigger(Note::new(60, 0.005), &ctx).unwrap();
        assert!(backend.voices_created().is_empty());
        assert_eq!(voice.legato(), &LegatoState::default());
    }

    #[test]
    fn test_finish_releases_without_detaching() {
        let backend = RecordingBackend::default();
        let mut voice = MelodyVoice::new();
        play(&mut voice, &backend, &[60, 60], 0.5);
        voice.finish(&backend);

        assert_eq!(voice.legato(), &LegatoState::default());
        assert_eq!(backend.count(|op| matches!(op, BackendOp::StopVoice { node: 1, .. })), 1);
        assert_eq!(backend.count(|op| matches!(op, BackendOp::DetachVoice { .. })), 0);
        // Still fading, so a stop right after can cut it
        assert_eq!(voice.sounding(0.5), 1);
    }

    #[test]
    fn test_silence_releases_held_note() {
        let backend = RecordingBackend::default();
        let mut voice = MelodyVoice::new();
        play(&mut voice, &backend, &[60], 0.5);
        backend.set_time(1.0);
        voice.silence(&backend);

        assert_eq!(voice.legato(), &LegatoState::default());
        assert_eq!(
            backend.count(|op| matches!(op, BackendOp::StopVoice { node: 1, at } if (*at - 1.05).abs() < 1e-9)),
            1
        );
        // Silencing again has nothing left to do
        let before = backend.operations().len();
        voice.silence(&backend);
        assert_eq!(backend.operations().len(), before);
    }
}
