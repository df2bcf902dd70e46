// ============================================================================
// EFFECTS MODULE - The Shared Effects Bus
// ============================================================================
//
// All three voices play into one mono effects bus. The stages always run in
// this order:
//
//     Distortion -> Wah -> Tone filter -> Master gain
//
// SUBMODULES:
// - filters: biquad coefficients, state and a cached single-filter wrapper
// - distortion: waveshaper transfer curve
// - wah: LFO-swept band-pass
// - chain: the render-side processor and the control-side SignalChain
//
// ============================================================================

pub mod chain;
pub mod distortion;
pub mod filters;
pub mod wah;

pub use chain::{ChainProcessor, SignalChain};
pub use distortion::WaveshaperCurve;
pub use filters::{BiquadCoefficients, BiquadFilter, BiquadState, FilterType};
pub use wah::WahStage;
