// ============================================================================
// BACKEND.RS - The Audio Backend Seam
// ============================================================================
//
// AudioBackend describes what the voices and the sequencer MEAN to do
// (start a note, shape its gain, stop it, move a chain parameter) without
// saying how it is done. Two implementations exist:
//
// - RenderEngine (render.rs): actually produces samples for the device
// - RecordingBackend (this file): writes every call into a list so tests
//   can check timing and ordering without a clock or a sound card
//
// The backend is owned explicitly and shared as Arc<dyn AudioBackend>.
// There is no global audio context anywhere in the crate.
// ============================================================================

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::param::ParamEvent;
use crate::effects::WaveshaperCurve;

/// Identifies one voice node created through a backend
pub type NodeId = u64;

/// Result type for backend operations
pub type BackendResult<T = ()> = Result<T, BackendError>;

// ============================================================================
// ERRORS
// ============================================================================

/// Error from a backend operation
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The node was already stopped or detached
    NotConnected(NodeId),

    /// The output device failed
    Device(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotConnected(node) => write!(f, "node {} is not connected", node),
            BackendError::Device(message) => write!(f, "audio device error: {}", message),
        }
    }
}

impl std::error::Error for BackendError {}

// ============================================================================
// SOURCES
// ============================================================================

/// Oscillator shapes the voices use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
}

/// A mono block of pre-rendered audio
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, samples }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// What a voice node plays
#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    /// A free-running oscillator at a fixed frequency
    Oscillator { waveform: Waveform, frequency_hz: f32 },

    /// A one-shot buffer, optionally high-passed before the gain stage
    Sample {
        buffer: Arc<SampleBuffer>,
        highpass_hz: Option<f32>,
    },
}

/// Parameters of the shared effects chain that can be automated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainParam {
    /// Output gain stage
    MasterGain,

    /// Tone (low-pass) filter cutoff in Hz
    ToneCutoff,

    /// Wah LFO depth in Hz
    WahDepth,

    /// Wah band-pass Q
    WahQ,
}

// ============================================================================
// THE TRAIT
// ============================================================================

/// Semantic-level audio backend
///
/// Times are seconds on the backend's own clock (see `current_time`).
/// Every node created here feeds the input of the shared effects chain.
pub trait AudioBackend: Send + Sync {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// The clock all scheduled times refer to
    fn current_time(&self) -> f64;

    /// Creates a node that starts sounding at `start_time`
    fn create_voice(
        &self,
        source: SourceKind,
        initial_gain: f32,
        start_time: f64,
    ) -> BackendResult<NodeId>;

    /// Schedules a change on a node's gain
    fn automate_gain(&self, node: NodeId, event: ParamEvent) -> BackendResult;

    /// Makes the node stop at `at`; it is torn down once it has stopped
    fn stop_voice(&self, node: NodeId, at: f64) -> BackendResult;

    /// Removes a node immediately
    ///
    /// Returns `NotConnected` if the node is already gone.
    fn detach_voice(&self, node: NodeId) -> BackendResult;

    /// Schedules a change on one of the chain parameters
    fn automate_chain(&self, param: ChainParam, event: ParamEvent) -> BackendResult;

    /// Swaps the waveshaper transfer curve
    fn set_distortion_curve(&self, curve: Arc<WaveshaperCurve>) -> BackendResult;
}

// ============================================================================
// RECORDING BACKEND
// ============================================================================

/// An operation recorded by `RecordingBackend`
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOp {
    CreateVoice {
        node: NodeId,
        source: SourceKind,
        initial_gain: f32,
        start_time: f64,
    },
    AutomateGain {
        node: NodeId,
        event: ParamEvent,
    },
    StopVoice {
        node: NodeId,
        at: f64,
    },
    DetachVoice {
        node: NodeId,
    },
    AutomateChain {
        param: ChainParam,
        event: ParamEvent,
    },
    SetDistortionCurve {
        amount: f32,
    },
}

struct RecordingState {
    clock: f64,
    next_node: NodeId,
    live: HashSet<NodeId>,
    ops: Vec<BackendOp>,
}

/// Backend that records every call instead of making sound
///
/// The clock only moves when a test moves it with `set_time`/`advance`.
/// Stopped nodes stay "connected" until detached, so double detaches are
/// reported the same way the render engine reports them.
pub struct RecordingBackend {
    sample_rate: u32,
    state: Mutex<RecordingState>,
}

impl RecordingBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Mutex::new(RecordingState {
                clock: 0.0,
                next_node: 1,
                live: HashSet::new(),
                ops: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the clock to an absolute time
    pub fn set_time(&self, time: f64) {
        self.lock().clock = time;
    }

    /// Moves the clock forward
    pub fn advance(&self, seconds: f64) {
        self.lock().clock += seconds;
    }

    /// All recorded operations, oldest first
    pub fn operations(&self) -> Vec<BackendOp> {
        self.lock().ops.clone()
    }

    /// Forgets recorded operations (live nodes are kept)
    pub fn clear(&self) {
        self.lock().ops.clear();
    }

    /// Counts operations matching a predicate
    pub fn count<F: Fn(&BackendOp) -> bool>(&self, f: F) -> usize {
        self.lock().ops.iter().filter(|op| f(op)).count()
    }

    /// Every CreateVoice operation
    pub fn voices_created(&self) -> Vec<BackendOp> {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, BackendOp::CreateVoice { .. }))
            .cloned()
            .collect()
    }

    /// Gain events scheduled for one node, in order
    pub fn gain_events(&self, node: NodeId) -> Vec<ParamEvent> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                BackendOp::AutomateGain { node: n, event } if *n == node => Some(*event),
                _ => None,
            })
            .collect()
    }

    /// Events scheduled on one chain parameter, in order
    pub fn chain_events(&self, param: ChainParam) -> Vec<ParamEvent> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                BackendOp::AutomateChain { param: p, event } if *p == param => Some(*event),
                _ => None,
            })
            .collect()
    }

    /// True while a node has been created and not detached
    pub fn is_live(&self, node: NodeId) -> bool {
        self.lock().live.contains(&node)
    }

    /// Number of nodes created and not detached
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(48000)
    }
}

impl AudioBackend for RecordingBackend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.lock().clock
    }

    fn create_voice(
        &self,
        source: SourceKind,
        initial_gain: f32,
        start_time: f64,
    ) -> BackendResult<NodeId> {
        let mut state = self.lock();
        let node = state.next_node;
        state.next_node += 1;
        state.live.insert(node);
        state.ops.push(BackendOp::CreateVoice {
            node,
            source,
            initial_gain,
            start_time,
        });
        Ok(node)
    }

    fn automate_gain(&self, node: NodeId, event: ParamEvent) -> BackendResult {
        let mut state = self.lock();
        if !state.live.contains(&node) {
            return Err(BackendError::NotConnected(node));
        }
        state.ops.push(BackendOp::AutomateGain { node, event });
        Ok(())
    }

    fn stop_voice(&self, node: NodeId, at: f64) -> BackendResult {
        let mut state = self.lock();
        if !state.live.contains(&node) {
            return Err(BackendError::NotConnected(node));
        }
        state.ops.push(BackendOp::StopVoice { node, at });
        Ok(())
    }

    fn detach_voice(&self, node: NodeId) -> BackendResult {
        let mut state = self.lock();
        if !state.live.remove(&node) {
            return Err(BackendError::NotConnected(node));
        }
        state.ops.push(BackendOp::DetachVoice { node });
        Ok(())
    }

    fn automate_chain(&self, param: ChainParam, event: ParamEvent) -> BackendResult {
        self.lock().ops.push(BackendOp::AutomateChain { param, event });
        Ok(())
    }

    fn set_distortion_curve(&self, curve: Arc<WaveshaperCurve>) -> BackendResult {
        self.lock().ops.push(BackendOp::SetDistortionCurve {
            amount: curve.amount(),
        });
        Ok(())
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
