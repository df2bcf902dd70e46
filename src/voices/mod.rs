// ============================================================================
// VOICES MODULE - The Three Synth Voices
// ============================================================================
//
// One voice per channel, all driven the same way:
//
//     voice.trigger(note, &TriggerContext { backend, time, effective_duration })
//     voice.silence(backend)
//
// SUBMODULES:
// - melody: sawtooth lead, legato (repeated pitches are held, not re-struck)
// - pluck: square-wave plucks, one short node per note
// - percussion: sample-based kick / hi-hat, picked by pitch
// - samples: renders the two percussion buffers
//
// NODE LIFETIME:
// Voices create nodes through the backend, shape their gain, and schedule a
// stop time. Once a node has stopped the backend tears it down. Voices only
// detach nodes themselves when silence() cuts them short; finish() at the
// end of a pass releases held notes and leaves the rest to ring out.
//
// Every node a voice creates plays into the shared effects chain input.
// ============================================================================

pub mod melody;
pub mod percussion;
pub mod pluck;
pub mod samples;

pub use melody::{LegatoState, MelodyVoice};
pub use percussion::{DrumSound, PercussionVoice};
pub use pluck::PluckVoice;
pub use samples::DrumKit;

use crate::analysis::{Channel, Note};
use crate::audio::{AudioBackend, BackendError, BackendResult, NodeId, ParamEvent};

// ============================================================================
// SHARED CONSTANTS
// ============================================================================

/// Gain every new node starts from (not zero, so ramps never start at 0)
pub const START_GAIN: f32 = 0.001;

/// Gain a release fades to before the node is stopped
pub const RELEASE_FLOOR: f32 = 0.0001;

/// Peak gain per unit velocity for the tonal voices
pub const TONAL_PEAK_GAIN: f32 = 0.3;

// ============================================================================
// TRIGGER CONTEXT
// ============================================================================

/// Everything a voice needs to know to play one step
pub struct TriggerContext<'a> {
    /// Where to create and automate nodes
    pub backend: &'a dyn AudioBackend,

    /// Clock time of the step
    pub time: f64,

    /// How long this step lasts in seconds (tick interval * downsample)
    pub effective_duration: f64,
}

// ============================================================================
// VOICE TRAIT
// ============================================================================

/// A synth voice that turns notes into backend nodes
pub trait Voice: Send {
    /// Which note stream this voice plays
    fn channel(&self) -> Channel;

    /// Plays (or holds, or releases) for one step
    fn trigger(&mut self, note: Note, ctx: &TriggerContext<'_>) -> BackendResult;

    /// Cuts everything the voice still has sounding
    fn silence(&mut self, backend: &dyn AudioBackend);

    /// Ends a pass without cutting anything short
    ///
    /// Nodes with a scheduled stop are left to play out. Only voices that
    /// hold notes open need to do anything here.
    fn finish(&mut self, _backend: &dyn AudioBackend) {}

    /// Nodes the voice still considers sounding at `now`
    fn sounding(&self, now: f64) -> usize;
}

// ============================================================================
// NODE TRACKER
// ============================================================================

/// Nodes with a known end time
#[derive(Clone, Debug, Default)]
pub struct NodeTracker {
    nodes: Vec<(NodeId, f64)>,
}

impl NodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, node: NodeId, end_time: f64) {
        self.nodes.push((node, end_time));
    }

    /// Forgets nodes the backend has already torn down
    pub fn forget_ended(&mut self, now: f64) {
        self.nodes.retain(|(_, end)| *end > now);
    }

    pub fn sounding(&self, now: f64) -> usize {
        self.nodes.iter().filter(|(_, end)| *end > now).count()
    }

    /// Detaches every node still sounding at `now` and clears the list
    pub fn detach_all(&mut self, backend: &dyn AudioBackend, now: f64) {
        for (node, end) in self.nodes.drain(..) {
            if end > now {
                detach_quietly(backend, node);
            }
        }
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Detaches a node, treating "already gone" as a warning only
pub fn detach_quietly(backend: &dyn AudioBackend, node: NodeId) {
    match backend.detach_voice(node) {
        Ok(()) => {}
        Err(BackendError::NotConnected(_)) => {
            log::warn!("node {} was already disconnected", node);
        }
        Err(e) => log::warn!("could not detach node {}: {}", node, e),
    }
}

/// Fades a node out from wherever it is now, then stops it
///
/// Returns the time the node stops.
pub fn release(
    backend: &dyn AudioBackend,
    node: NodeId,
    now: f64,
    fade_seconds: f64,
) -> BackendResult<f64> {
    let end = now + fade_seconds;
    backend.automate_gain(node, ParamEvent::CancelAndHold { time: now })?;
    backend.automate_gain(node, ParamEvent::LinearRampTo { value: RELEASE_FLOOR, end_time: end })?;
    backend.stop_voice(node, end)?;
    Ok(end)
}

// ============================================================================
// VOICE BANK
// ============================================================================

/// The three voices in trigger order
pub struct VoiceBank {
    voices: Vec<Box<dyn Voice>>,
}

impl VoiceBank {
    /// Builds melody, pluck and percussion voices for a sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self::with_noise_seed(sample_rate, samples::DEFAULT_NOISE_SEED)
    }

    pub fn with_noise_seed(sample_rate: u32, noise_seed: u64) -> Self {
        Self {
            voices: vec![
                Box::new(MelodyVoice::new()),
                Box::new(PluckVoice::new()),
                Box::new(PercussionVoice::new(DrumKit::new(sample_rate, noise_seed))),
            ],
        }
    }

    /// Triggers one step: melody, then pluck, then percussion
    ///
    /// A failure in one voice is logged and does not stop the others.
    pub fn trigger_step(&mut self, notes: [Note; 3], ctx: &TriggerContext<'_>) {
        for (voice, note) in self.voices.iter_mut().zip(notes) {
            if let Err(e) = voice.trigger(note, ctx) {
                log::warn!("{} voice failed to trigger: {}", voice.channel().name(), e);
            }
        }
    }

    /// Silences every voice
    pub fn silence_all(&mut self, backend: &dyn AudioBackend) {
        for voice in &mut self.voices {
            voice.silence(backend);
        }
    }

    /// Lets every voice wind down at the natural end of a pass
    pub fn finish_all(&mut self, backend: &dyn AudioBackend) {
        for voice in &mut self.voices {
            voice.finish(backend);
        }
    }

    /// Total nodes still sounding at `now`
    pub fn sounding(&self, now: f64) -> usize {
        self.voices.iter().map(|voice| voice.sounding(now)).sum()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{BackendOp, RecordingBackend, SourceKind, Waveform};

    fn context(backend: &RecordingBackend, time: f64) -> TriggerContext<'_> {
        TriggerContext {
            backend,
            time,
            effective_duration: 0.5,
        }
    }

    #[test]
    fn test_bank_triggers_in_channel_order() {
        let backend = RecordingBackend::default();
        let mut bank = VoiceBank::new(48000);
        let notes = [Note::new(64, 1.0), Note::new(52, 1.0), Note::new(40, 1.0)];
        bank.trigger_step(notes, &context(&backend, 0.0));

        let created = backend.voices_created();
        assert_eq!(created.len(), 3);
        assert!(matches!(
            &created[0],
            BackendOp::CreateVoice {
                source: SourceKind::Oscillator { waveform: Waveform::Sawtooth, .. },
                ..
            }
        ));
        assert!(matches!(
            &created[1],
            BackendOp::CreateVoice {
                source: SourceKind::Oscillator { waveform: Waveform::Square, .. },
                ..
            }
        ));
        assert!(matches!(
            &created[2],
            BackendOp::CreateVoice { source: SourceKind::Sample { .. }, .. }
        ));
    }

    #[test]
    fn test_rests_create_nothing() {
        let backend = RecordingBackend::default();
        let mut bank = VoiceBank::new(48000);
        bank.trigger_step([Note::REST; 3], &context(&backend, 0.0));
        assert!(backend.voices_created().is_empty());
    }

    #[test]
    fn test_finish_lets_last_step_ring_out() {
        let backend = RecordingBackend::default();
        let mut bank = VoiceBank::new(8000);
        let notes = [Note::new(64, 1.0), Note::new(52, 1.0), Note::new(50, 1.0)];
        bank.trigger_step(notes, &context(&backend, 0.0));
        bank.finish_all(&backend);

        assert_eq!(backend.count(|op| matches!(op, BackendOp::DetachVoice { .. })), 0);
        assert_eq!(backend.live_count(), 3);
        // Every node, the held melody included, has a stop time
        assert_eq!(backend.count(|op| matches!(op, BackendOp::StopVoice { .. })), 3);
    }

    #[test]
    fn test_release_fades_then_stops() {
        let backend = RecordingBackend::default();
        let node = backend
            .create_voice(
                SourceKind::Oscillator { waveform: Waveform::Sine, frequency_hz: 100.0 },
                START_GAIN,
                0.0,
            )
            .unwrap();
        let end = release(&backend, node, 1.0, 0.05).unwrap();
        assert!((end - 1.05).abs() < 1e-12);
        assert_eq!(
            backend.gain_events(node),
            vec![
                ParamEvent::CancelAndHold { time: 1.0 },
                ParamEvent::LinearRampTo { value: RELEASE_FLOOR, end_time: end },
            ]
        );
        assert_eq!(backend.count(|op| matches!(op, BackendOp::StopVoice { .. })), 1);
    }

    #[test]
    fn test_tracker_detaches_only_sounding_nodes() {
        let backend = RecordingBackend::default();
        let source = SourceKind::Oscillator { waveform: Waveform::Sine, frequency_hz: 100.0 };
        let old = backend.create_voice(source.clone(), 0.0, 0.0).unwrap();
        let fresh = backend.create_voice(source, 0.0, 0.0).unwrap();

        let mut tracker = NodeTracker::new();
        tracker.track(old, 0.2);
        tracker.track(fresh, 1.2);
        assert_eq!(tracker.sounding(1.0), 1);

        tracker.detach_all(&backend, 1.0);
        assert!(backend.is_live(old));
        assert!(!backend.is_live(fresh));
        assert_eq!(tracker.sounding(0.0), 0);
    }

    #[test]
    fn test_detach_quietly_tolerates_double_detach() {
        let backend = RecordingBackend::default();
        let node = backend
            .create_voice(
                SourceKind::Oscillator { waveform: Waveform::Sine, frequency_hz: 100.0 },
                0.0,
                0.0,
            )
            .unwrap();
        detach_quietly(&backend, node);
        detach_quietly(&backend, node);
        assert_eq!(backend.count(|op| matches!(op, BackendOp::DetachVoice { .. })), 1);
    }
}
