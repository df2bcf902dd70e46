// ============================================================================
// AUDIO MODULE - Backends, Scheduling and Output
// ============================================================================
//
// SUBMODULES:
// - param: scheduled parameter timelines (set, ramp, target, hold)
// - backend: the AudioBackend trait and the recording test double
// - render: the software render engine (the real backend)
// - device: miniaudio playback device that drains the render engine
//
// ============================================================================

pub mod backend;
pub mod device;
pub mod param;
pub mod render;

pub use backend::{
    AudioBackend, BackendError, BackendOp, BackendResult, ChainParam, NodeId, RecordingBackend,
    SampleBuffer, SourceKind, Waveform,
};
pub use device::OutputDevice;
pub use param::{AudioParam, ParamEvent};
pub use render::RenderEngine;

/// Sample rate used by the player unless told otherwise
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
