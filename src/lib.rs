// ============================================================================
// PIXELSONG - Image-to-Music Engine
// ============================================================================
//
// Turns a picture into a short three-voice performance.
//
// DATA FLOW:
//
//     PixelBuffer --extract()------> ExtractedNotes --Sequencer::play()--+
//          |                                                             |
//          +-----measure_mood()--> VisualMetrics                         v
//                                      |                    melody / pluck / percussion
//                                      v                                 |
//     EffectSettings ------------> SignalChain <-------------------------+
//                                      |
//                          distortion -> wah -> tone -> master gain -> out
//
// MODULES:
// - helper: pitch and interpolation math shared by everything else
// - config: settings, style table, debug levels
// - analysis: note extraction and mood measurement
// - audio: backend trait, render engine, output device
// - effects: the shared signal chain and its DSP stages
// - voices: melody, pluck and percussion synths
// - sequencer: transport state and the ticker
// ============================================================================

pub mod analysis;
pub mod audio;
pub mod config;
pub mod effects;
pub mod helper;
pub mod sequencer;
pub mod voices;

pub use analysis::{extract, measure_mood, ExtractedNotes, Note, PixelBuffer, VisualMetrics};
pub use audio::{AudioBackend, RecordingBackend, RenderEngine};
pub use config::{DebugLevel, EffectSettings, StyleTable, StyleTag, StyleTempo};
pub use sequencer::Sequencer;
