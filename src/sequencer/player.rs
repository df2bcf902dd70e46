// ============================================================================
// PLAYER.RS - The Sequencer
// ============================================================================
//
// Owns the voices, the signal chain control side and the playback state, and
// drives them from a ticker thread:
//
//     play()  -> PlaybackState::start, spawn ticker
//     ticker  -> every tick: advance(), trigger the voices
//     end     -> release held notes, let the last step ring out
//     stop()  -> cancel the ticker, silence the voices, reset state
//
// THREADING:
// The ticker sleeps in recv_timeout() on a cancel channel, so the next tick
// is only armed after the previous one returned and stop() never has to wait
// out a whole interval. Each play session gets a generation number; a ticker
// that wakes up after its session was replaced exits without playing.
//
// Settings and mood updates go straight to the chain and never touch the
// transport.
// ============================================================================

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::transport::{advance, PlaybackState};
use crate::analysis::{ExtractedNotes, VisualMetrics};
use crate::audio::AudioBackend;
use crate::config::EffectSettings;
use crate::effects::SignalChain;
use crate::voices::{TriggerContext, VoiceBank};

/// State shared between the sequencer and its ticker thread
struct Shared {
    playback: PlaybackState,
    sequences: ExtractedNotes,
    voices: VoiceBank,
    chain: SignalChain,

    /// Bumped by every play() and stop()
    generation: u64,
}

impl Shared {
    /// Plays one tick; returns true when the pass is over
    fn tick(&mut self, backend: &dyn AudioBackend) -> bool {
        let (next, outcome) = advance(self.playback, &self.sequences);
        self.playback = next;

        if let (Some(index), Some(notes)) = (outcome.index, outcome.step()) {
            log::debug!(
                "tick {}: melody {} pluck {} percussion {}",
                index,
                notes[0].pitch,
                notes[1].pitch,
                notes[2].pitch
            );
            let ctx = TriggerContext {
                backend,
                time: backend.current_time(),
                effective_duration: outcome.effective_duration,
            };
            self.voices.trigger_step(notes, &ctx);
        }

        if outcome.finished {
            log::info!("playback finished after {} steps", self.playback.length);
            self.playback = PlaybackState::default();
            self.voices.finish_all(backend);
        }
        outcome.finished || !self.playback.is_playing
    }

    /// Back to STOPPED with nothing sounding
    fn reset(&mut self, backend: &dyn AudioBackend) {
        self.playback = PlaybackState::default();
        self.voices.silence_all(backend);
    }
}

struct Ticker {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Three-voice step sequencer over one shared backend
pub struct Sequencer {
    backend: Arc<dyn AudioBackend>,
    shared: Arc<Mutex<Shared>>,
    ticker: Mutex<Option<Ticker>>,
}

impl Sequencer {
    /// Builds the voices and the chain control for `backend`
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        let voices = VoiceBank::new(backend.sample_rate());
        Self::with_voices(backend, voices)
    }

    /// Same as `new`, with a voice bank built by the caller
    pub fn with_voices(backend: Arc<dyn AudioBackend>, voices: VoiceBank) -> Self {
        Self {
            backend,
            shared: Arc::new(Mutex::new(Shared {
                playback: PlaybackState::default(),
                sequences: ExtractedNotes::default(),
                voices,
                chain: SignalChain::new(),
                generation: 0,
            })),
            ticker: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    /// Starts one pass over `sequences`
    ///
    /// Any running session is stopped first. Empty or misaligned sequences
    /// and unusable tempos then leave the sequencer stopped (and are logged).
    pub fn play(&self, sequences: &ExtractedNotes, bpm: f64, downsample_rate: usize) {
        self.stop();

        if sequences.is_empty() || !sequences.is_aligned() {
            log::warn!(
                "nothing to play: sequence lengths {}/{}/{}",
                sequences.melody.len(),
                sequences.pluck.len(),
                sequences.percussion.len()
            );
            return;
        }
        let Some(playback) = PlaybackState::start(sequences.len(), bpm, downsample_rate) else {
            log::warn!("cannot play at {} bpm", bpm);
            return;
        };

        let interval = playback.tick_interval();
        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.playback = playback;
            shared.sequences = sequences.clone();
            shared.generation
        };

        let (cancel, cancelled) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let backend = Arc::clone(&self.backend);
        let spawned = thread::Builder::new()
            .name("pixelsong-ticker".to_string())
            .spawn(move || loop {
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let mut shared = lock(&shared);
                if shared.generation != generation {
                    break;
                }
                if shared.tick(backend.as_ref()) {
                    break;
                }
            });

        match spawned {
            Ok(handle) => {
                *lock(&self.ticker) = Some(Ticker { cancel, handle });
                log::info!(
                    "playing {} steps at {} bpm, downsample {} ({:.0} ms per tick)",
                    playback.length,
                    playback.tempo_bpm,
                    playback.downsample_rate,
                    interval.as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                log::warn!("could not start the ticker thread: {}", e);
                lock(&self.shared).reset(self.backend.as_ref());
            }
        }
    }

    /// Stops playback and silences every voice
    ///
    /// Safe to call when already stopped, and from the ticker thread itself.
    pub fn stop(&self) {
        let ticker = lock(&self.ticker).take();
        if let Some(ticker) = ticker {
            // The ticker may already have exited on its own
            let _ = ticker.cancel.send(());
            if ticker.handle.thread().id() != thread::current().id()
                && ticker.handle.join().is_err()
            {
                log::warn!("ticker thread panicked");
            }
        }

        let mut shared = lock(&self.shared);
        shared.generation += 1;
        if shared.playback.is_playing {
            log::info!("stopped at step {}", shared.playback.index);
        }
        shared.reset(self.backend.as_ref());
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.shared).playback.is_playing
    }

    /// Next step to be played, None when stopped
    pub fn position(&self) -> Option<usize> {
        let shared = lock(&self.shared);
        shared.playback.is_playing.then_some(shared.playback.index)
    }

    /// Snapshot of the playback state
    pub fn playback(&self) -> PlaybackState {
        lock(&self.shared).playback
    }

    /// Applies user settings to the chain without touching playback
    pub fn update_audio_settings(&self, settings: &EffectSettings) {
        lock(&self.shared)
            .chain
            .apply_settings(self.backend.as_ref(), settings);
    }

    /// Applies image mood to the chain without touching playback
    pub fn update_visual_metrics(&self, saturation: f32, brightness: f32) {
        lock(&self.shared)
            .chain
            .apply_visual_metrics(self.backend.as_ref(), VisualMetrics::new(saturation, brightness));
    }

    /// Last settings applied, clamped
    pub fn settings(&self) -> EffectSettings {
        lock(&self.shared).chain.settings().clone()
    }

    /// Blocks until the current pass ends or `timeout` runs out
    ///
    /// Returns true if playback stopped in time.
    pub fn wait(&self, timeout: Duration) -> bool {
        let poll = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        while self.is_playing() {
            if waited >= timeout {
                return false;
            }
            thread::sleep(poll);
            waited += poll;
        }
        true
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{extract, Note, PixelBuffer};
    use crate::audio::{BackendOp, ChainParam, ParamEvent, RecordingBackend, SourceKind};
    use crate::helper::midi_to_frequency;

    /// Fast enough that a whole pass takes a few tens of milliseconds
    const FAST_BPM: f64 = 6000.0;

    fn setup() -> (Arc<RecordingBackend>, Sequencer) {
        let backend = Arc::new(RecordingBackend::default());
        let sequencer = Sequencer::new(backend.clone());
        (backend, sequencer)
    }

    /// Pluck-only sequences whose pitch encodes the step index
    fn indexed_plucks(length: usize) -> ExtractedNotes {
        ExtractedNotes::new(
            vec![Note::REST; length],
            (0..length).map(|i| Note::new(48 + i as u8, 1.0)).collect(),
            vec![Note::REST; length],
        )
    }

    fn played_pluck_steps(backend: &RecordingBackend) -> Vec<usize> {
        backend
            .voices_created()
            .into_iter()
            .filter_map(|op| match op {
                BackendOp::CreateVoice {
                    source: SourceKind::Oscillator { frequency_hz, .. },
                    ..
                } => (0..12).find(|i| (midi_to_frequency(48 + *i as u8) - frequency_hz).abs() < 1e-3),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_pass_with_downsample() {
        let (backend, sequencer) = setup();
        sequencer.play(&indexed_plucks(10), FAST_BPM, 2);
        assert!(sequencer.wait(Duration::from_secs(5)));

        assert_eq!(played_pluck_steps(&backend), vec![0, 2, 4, 6, 8]);
        assert_eq!(sequencer.position(), None);
    }

    #[test]
    fn test_last_step_is_not_cut_off() {
        let (backend, sequencer) = setup();
        let notes = ExtractedNotes::new(
            vec![Note::new(64, 1.0)],
            vec![Note::new(52, 1.0)],
            vec![Note::new(50, 1.0)],
        );
        sequencer.play(&notes, FAST_BPM, 1);
        assert!(sequencer.wait(Duration::from_secs(5)));

        assert_eq!(backend.voices_created().len(), 3);
        assert_eq!(backend.count(|op| matches!(op, BackendOp::DetachVoice { .. })), 0);
        assert_eq!(backend.live_count(), 3);
    }

    #[test]
    fn test_empty_or_misaligned_input_is_ignored() {
        let (backend, sequencer) = setup();
        sequencer.play(&ExtractedNotes::default(), 120.0, 1);
        assert!(!sequencer.is_playing());

        let misaligned = ExtractedNotes::new(vec![Note::REST; 3], vec![Note::REST; 2], vec![]);
        sequencer.play(&misaligned, 120.0, 1);
        assert!(!sequencer.is_playing());

        sequencer.play(&indexed_plucks(4), 0.0, 1);
        assert!(!sequencer.is_playing());
        assert!(backend.operations().is_empty());
    }

    #[test]
    fn test_rejected_play_still_stops_running_session() {
        let (_backend, sequencer) = setup();
        sequencer.play(&indexed_plucks(8), 60.0, 1);
        assert!(sequencer.is_playing());

        sequencer.play(&ExtractedNotes::default(), 60.0, 1);
        assert!(!sequencer.is_playing());

        sequencer.play(&indexed_plucks(8), 60.0, 1);
        sequencer.play(&indexed_plucks(8), f64::NAN, 1);
        assert!(!sequencer.is_playing());
        assert_eq!(sequencer.position(), None);
    }

    #[test]
    fn test_stop_twice_equals_stop_once() {
        let (backend, sequencer) = setup();
        sequencer.play(&indexed_plucks(8), 60.0, 1);
        sequencer.stop();
        let after_first = backend.operations().len();
        sequencer.stop();
        assert_eq!(backend.operations().len(), after_first);
        assert!(!sequencer.is_playing());
    }

    #[test]
    fn test_stop_before_first_tick_plays_nothing() {
        let (backend, sequencer) = setup();
        sequencer.play(&indexed_plucks(8), 60.0, 1);
        assert_eq!(sequencer.position(), Some(0));
        sequencer.stop();
        assert!(backend.voices_created().is_empty());
    }

    #[test]
    fn test_replay_restarts_from_the_top() {
        let (_backend, sequencer) = setup();
        sequencer.play(&indexed_plucks(8), 60.0, 1);
        sequencer.play(&indexed_plucks(3), 60.0, 1);
        assert_eq!(sequencer.playback().length, 3);
        assert_eq!(sequencer.position(), Some(0));
        sequencer.stop();
    }

    #[test]
    fn test_black_image_still_runs_one_pass() {
        let (backend, sequencer) = setup();
        let notes = extract(&PixelBuffer::blank(16, 8), 4);
        assert!(notes.is_silent());

        sequencer.play(&notes, FAST_BPM, 1);
        assert!(sequencer.wait(Duration::from_secs(5)));
        assert!(backend.voices_created().is_empty());
        assert_eq!(sequencer.position(), None);
    }

    #[test]
    fn test_settings_and_mood_do_not_touch_playback() {
        let (backend, sequencer) = setup();
        sequencer.play(&indexed_plucks(8), 60.0, 1);

        let settings = EffectSettings {
            volume: 3.0,
            ..EffectSettings::default()
        };
        sequencer.update_audio_settings(&settings);
        sequencer.update_visual_metrics(0.5, 0.5);

        assert!(sequencer.is_playing());
        assert_eq!(sequencer.settings().volume, 1.0);
        assert!(!backend.chain_events(ChainParam::ToneCutoff).is_empty());
        assert_eq!(
            backend.chain_events(ChainParam::MasterGain)[0],
            ParamEvent::CancelAndHold { time: 0.0 }
        );
        sequencer.stop();
    }
}
