// ============================================================================
// SEQUENCER MODULE - Transport and Playback
// ============================================================================
//
// SUBMODULES:
// - transport: PlaybackState and the pure per-tick advance()
// - player: the Sequencer that owns the voices and runs the ticker thread
//
// ============================================================================

pub mod player;
pub mod transport;

pub use player::Sequencer;
pub use transport::{advance, tick_interval_ms, PlaybackState, TickOutcome};
