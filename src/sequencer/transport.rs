// ============================================================================
// TRANSPORT.RS - Pure Playback Transitions
// ============================================================================
//
// Everything the sequencer decides per tick, with no clock and no backend:
//
//     let (next, outcome) = advance(state, &sequences);
//
// STATE MACHINE:
//
//     STOPPED --play()--> PLAYING --stop()--------------> STOPPED
//                            |
//                            +--index >= length (tick)--> STOPPED
//
// One tick reads the three notes at `index`, hands them out in trigger
// order (melody, pluck, percussion), then moves `index` forward by the
// downsample rate. A tick that moves past the end finishes the pass. There
// is no looping.
// ============================================================================

use std::time::Duration;

use crate::analysis::{Channel, ExtractedNotes, Note};

/// Ticks per beat are two: each tick is half a beat long
pub const TICK_BEAT_FRACTION: f64 = 0.5;

/// Milliseconds between ticks at a tempo
///
/// Returns None for a tempo that is not finite and positive.
pub fn tick_interval_ms(bpm: f64) -> Option<f64> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return None;
    }
    Some((60.0 / bpm) * 1000.0 * TICK_BEAT_FRACTION)
}

// ============================================================================
// PLAYBACK STATE
// ============================================================================

/// Position and tempo of one play session
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlaybackState {
    /// Next step to play
    pub index: usize,

    /// False once the pass is over (or before it started)
    pub is_playing: bool,

    /// Tempo the session was started with
    pub tempo_bpm: f64,

    /// Steps advanced per tick, always >= 1 while playing
    pub downsample_rate: usize,

    /// Length of the sequences being played
    pub length: usize,
}

impl PlaybackState {
    /// A fresh session at step 0
    ///
    /// Returns None when there is nothing to play or the tempo is unusable.
    /// A downsample rate of 0 is treated as 1.
    pub fn start(length: usize, tempo_bpm: f64, downsample_rate: usize) -> Option<Self> {
        if length == 0 {
            return None;
        }
        tick_interval_ms(tempo_bpm)?;
        Some(Self {
            index: 0,
            is_playing: true,
            tempo_bpm,
            downsample_rate: downsample_rate.max(1),
            length,
        })
    }

    /// Seconds between ticks (0 when stopped)
    pub fn tick_seconds(&self) -> f64 {
        tick_interval_ms(self.tempo_bpm).map_or(0.0, |ms| ms / 1000.0)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_seconds())
    }

    /// How long one played step lasts: a tick per skipped step
    pub fn effective_duration(&self) -> f64 {
        self.tick_seconds() * self.downsample_rate.max(1) as f64
    }
}

// ============================================================================
// ADVANCE
// ============================================================================

/// What one tick asks the voices to do
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutcome {
    /// Step that was read (None when the tick played nothing)
    pub index: Option<usize>,

    /// Notes to trigger, in trigger order
    pub triggers: Vec<(Channel, Note)>,

    /// Duration each trigger should assume, in seconds
    pub effective_duration: f64,

    /// True when this tick ended the pass
    pub finished: bool,
}

impl TickOutcome {
    /// The three triggered notes as one step, if the tick played one
    pub fn step(&self) -> Option<[Note; 3]> {
        match self.triggers.as_slice() {
            [(_, melody), (_, pluck), (_, percussion)] => Some([*melody, *pluck, *percussion]),
            _ => None,
        }
    }
}

/// One tick of the transport
pub fn advance(state: PlaybackState, sequences: &ExtractedNotes) -> (PlaybackState, TickOutcome) {
    let stopped = PlaybackState {
        is_playing: false,
        ..state
    };

    if !state.is_playing {
        return (stopped, TickOutcome::default());
    }

    let Some(notes) = sequences.notes_at(state.index).filter(|_| state.index < state.length)
    else {
        return (
            stopped,
            TickOutcome {
                finished: true,
                ..TickOutcome::default()
            },
        );
    };

    let next_index = state.index + state.downsample_rate.max(1);
    let finished = next_index >= state.length;

    let next = PlaybackState {
        index: next_index,
        is_playing: !finished,
        ..state
    };

    let outcome = TickOutcome {
        index: Some(state.index),
        triggers: Channel::ALL.into_iter().zip(notes).collect(),
        effective_duration: state.effective_duration(),
        finished,
    };

    (next, outcome)
}

// ============================================================================
// UNIT TESTS
// ============================================================================
