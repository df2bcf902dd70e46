// ============================================================================
// RENDER.RS - Software Render Engine
// ============================================================================
//
// The real AudioBackend. It keeps a small graph of voice nodes plus the
// effects chain behind one mutex, and turns it into samples on request.
//
// WHO CALLS WHAT:
// - The sequencer thread schedules: create_voice, automate_gain, stop_voice,
//   detach_voice, automate_chain. These only edit the graph, they never wait
//   on audio.
// - The device callback thread calls render() for each output buffer.
// - Tests call render_offline() to pull samples without any device.
//
// CLOCK:
// The clock is the number of frames rendered so far divided by the sample
// rate. It only moves as samples are produced, so everything scheduled is
// sample-accurate relative to what has actually been played.
//
// NODE LIFETIME:
// A node is silent before its start time, plays until its stop time (or
// until a sample source runs out), and is then removed from the graph at the
// end of the block. Detaching removes it at once.
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::{
    AudioBackend, BackendError, BackendResult, ChainParam, NodeId, SampleBuffer, SourceKind,
    Waveform,
};
use super::param::{AudioParam, ParamEvent};
use crate::effects::filters::{BiquadFilter, FilterType};
use crate::effects::{ChainProcessor, WaveshaperCurve};
use crate::helper::{polyblep, TWO_PI};

/// Butterworth Q for the per-voice high-pass
const VOICE_HIGHPASS_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

// ============================================================================
// SOURCES
// ============================================================================

/// Running state of one node's sound source
#[derive(Clone, Debug)]
enum SourceState {
    Oscillator {
        waveform: Waveform,
        phase: f32,
        phase_increment: f32,
    },
    Sample {
        buffer: Arc<SampleBuffer>,
        position: usize,
        highpass: Option<BiquadFilter>,
    },
}

impl SourceState {
    fn new(source: SourceKind, sample_rate: u32) -> Self {
        match source {
            SourceKind::Oscillator { waveform, frequency_hz } => SourceState::Oscillator {
                waveform,
                phase: 0.0,
                phase_increment: (frequency_hz / sample_rate as f32).clamp(0.0, 0.5),
            },
            SourceKind::Sample { buffer, highpass_hz } => SourceState::Sample {
                buffer,
                position: 0,
                highpass: highpass_hz.map(|cutoff| {
                    BiquadFilter::new(FilterType::HighPass, cutoff, VOICE_HIGHPASS_Q, sample_rate)
                }),
            },
        }
    }

    /// Next raw sample, or None once a sample source is exhausted
    fn next_sample(&mut self) -> Option<f32> {
        match self {
            SourceState::Oscillator { waveform, phase, phase_increment } => {
                let p = *phase;
                let inc = *phase_increment;
                let value = match waveform {
                    Waveform::Sine => (p * TWO_PI).sin(),
                    Waveform::Sawtooth => 2.0 * p - 1.0 - polyblep(p, inc),
                    Waveform::Square => {
                        let naive = if p < 0.5 { 1.0 } else { -1.0 };
                        naive + polyblep(p, inc) - polyblep((p + 0.5) % 1.0, inc)
                    }
                };
                *phase += inc;
                if *phase >= 1.0 {
                    *phase -= 1.0;
                }
                Some(value)
            }
            SourceState::Sample { buffer, position, highpass } => {
                let raw = *buffer.samples().get(*position)?;
                *position += 1;
                Some(match highpass {
                    Some(filter) => filter.process(raw),
                    None => raw,
                })
            }
        }
    }
}

// ============================================================================
// VOICE NODES
// ============================================================================

#[derive(Clone, Debug)]
struct VoiceNode {
    source: SourceState,
    gain: AudioParam,
    start_time: f64,
    stop_time: Option<f64>,
    finished: bool,
}

impl VoiceNode {
    #[inline]
    fn next(&mut self, t: f64) -> f32 {
        if self.finished || t < self.start_time {
            return 0.0;
        }
        if self.stop_time.is_some_and(|stop| t >= stop) {
            self.finished = true;
            return 0.0;
        }
        match self.source.next_sample() {
            Some(sample) => sample * self.gain.value_at(t),
            None => {
                self.finished = true;
                0.0
            }
        }
    }
}

// ============================================================================
// RENDER GRAPH
// ============================================================================

struct RenderGraph {
    frames_rendered: u64,
    next_node: NodeId,
    voices: HashMap<NodeId, VoiceNode>,
    chain: ChainProcessor,
}

impl RenderGraph {
    fn time(&self, sample_rate: u32) -> f64 {
        self.frames_rendered as f64 / sample_rate as f64
    }

    fn render(&mut self, output: &mut [f32], sample_rate: u32) {
        for (offset, slot) in output.iter_mut().enumerate() {
            let t = (self.frames_rendered + offset as u64) as f64 / sample_rate as f64;
            let mix: f32 = self.voices.values_mut().map(|voice| voice.next(t)).sum();
            *slot = self.chain.process(mix, t);
        }
        self.frames_rendered += output.len() as u64;

        let now = self.time(sample_rate);
        self.voices.retain(|_, voice| !voice.finished);
        for voice in self.voices.values_mut() {
            voice.gain.prune(now);
        }
        self.chain.prune(now);
    }
}

// ============================================================================
// RENDER ENGINE
// ============================================================================

/// In-process renderer; cheap to clone, all clones share one graph
#[derive(Clone)]
pub struct RenderEngine {
    sample_rate: u32,
    graph: Arc<Mutex<RenderGraph>>,
}

impl RenderEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            graph: Arc::new(Mutex::new(RenderGraph {
                frames_rendered: 0,
                next_node: 1,
                voices: HashMap::new(),
                chain: ChainProcessor::new(sample_rate),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RenderGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fills `output` with the next block of mono samples
    pub fn render(&self, output: &mut [f32]) {
        self.lock().render(output, self.sample_rate);
    }

    /// Renders `frames` samples into a new vector
    pub fn render_offline(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames];
        self.render(&mut output);
        output
    }

    /// Number of nodes still in the graph
    pub fn active_voices(&self) -> usize {
        self.lock().voices.len()
    }

    /// Master gain at the current clock
    pub fn master_gain(&self) -> f32 {
        let graph = self.lock();
        graph.chain.master_gain_at(graph.time(self.sample_rate))
    }
}

impl AudioBackend for RenderEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.lock().time(self.sample_rate)
    }

    fn create_voice(
        &self,
        source: SourceKind,
        initial_gain: f32,
        start_time: f64,
    ) -> BackendResult<NodeId> {
        let mut graph = self.lock();
        let node = graph.next_node;
        graph.next_node += 1;
        graph.voices.insert(
            node,
            VoiceNode {
                source: SourceState::new(source, self.sample_rate),
                gain: AudioParam::new(initial_gain),
                start_time,
                stop_time: None,
                finished: false,
            },
        );
        Ok(node)
    }

    fn automate_gain(&self, node: NodeId, event: ParamEvent) -> BackendResult {
        let mut graph = self.lock();
        let now = graph.time(self.sample_rate);
        let voice = graph
            .voices
            .get_mut(&node)
            .ok_or(BackendError::NotConnected(node))?;
        voice.gain.schedule(event, now);
        Ok(())
    }

    fn stop_voice(&self, node: NodeId, at: f64) -> BackendResult {
        let mut graph = self.lock();
        let voice = graph
            .voices
            .get_mut(&node)
            .ok_or(BackendError::NotConnected(node))?;
        voice.stop_time = Some(voice.stop_time.map_or(at, |existing| existing.min(at)));
        Ok(())
    }

    fn detach_voice(&self, node: NodeId) -> BackendResult {
        self.lock()
            .voices
            .remove(&node)
            .map(|_| ())
            .ok_or(BackendError::NotConnected(node))
    }

    fn automate_chain(&self, param: ChainParam, event: ParamEvent) -> BackendResult {
        let mut graph = self.lock();
        let now = graph.time(self.sample_rate);
        graph.chain.automate(param, event, now);
        Ok(())
    }

    fn set_distortion_curve(&self, curve: Arc<WaveshaperCurve>) -> BackendResult {
        self.lock().chain.set_curve(curve);
        Ok(())
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48000;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0, |acc, s| acc.max(s.abs()))
    }

    fn tone() -> SourceKind {
        SourceKind::Oscillator {
            waveform: Waveform::Sine,
            frequency_hz: 440.0,
        }
    }

    #[test]
    fn test_clock_follows_rendered_frames() {
        let engine = RenderEngine::new(RATE);
        assert_eq!(engine.current_time(), 0.0);
        engine.render_offline(24000);
        assert!((engine.current_time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph_renders_silence() {
        let engine = RenderEngine::new(RATE);
        assert_eq!(peak(&engine.render_offline(4800)), 0.0);
    }

    #[test]
    fn test_voice_waits_for_start_time() {
        let engine = RenderEngine::new(RATE);
        engine.create_voice(tone(), 1.0, 0.1).unwrap();
        let block = engine.render_offline(9600);
        assert_eq!(peak(&block[..4700]), 0.0);
        assert!(peak(&block[4900..]) > 0.1);
    }

    #[test]
    fn test_stopped_voice_is_removed() {
        let engine = RenderEngine::new(RATE);
        let node = engine.create_voice(tone(), 1.0, 0.0).unwrap();
        engine.stop_voice(node, 0.05).unwrap();
        engine.render_offline(4800);
        assert_eq!(engine.active_voices(), 0);
        assert_eq!(engine.detach_voice(node), Err(BackendError::NotConnected(node)));
    }

    #[test]
    fn test_sample_source_ends_by_itself() {
        let engine = RenderEngine::new(RATE);
        let buffer = Arc::new(SampleBuffer::new(RATE, vec![0.5; 480]));
        engine
            .create_voice(SourceKind::Sample { buffer, highpass_hz: None }, 1.0, 0.0)
            .unwrap();
        let block = engine.render_offline(960);
        assert!(block[100] != 0.0);
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_gain_ramp_shapes_output() {
        let engine = RenderEngine::new(RATE);
        let node = engine.create_voice(tone(), 0.0, 0.0).unwrap();
        engine
            .automate_gain(node, ParamEvent::LinearRampTo { value: 1.0, end_time: 0.1 })
            .unwrap();
        let block = engine.render_offline(9600);
        assert!(peak(&block[..480]) < 0.08);
        assert!(peak(&block[4800..]) > 0.4);
    }

    #[test]
    fn test_detach_removes_voice_at_once() {
        let engine = RenderEngine::new(RATE);
        let node = engine.create_voice(tone(), 1.0, 0.0).unwrap();
        assert!(peak(&engine.render_offline(480)) > 0.1);

        engine.detach_voice(node).unwrap();
        assert_eq!(engine.active_voices(), 0);

        // Only the chain filters' ring-down is left after the cut
        let after = engine.render_offline(9600);
        assert!(peak(&after[4800..]) < 1e-2);
    }

    #[test]
    fn test_master_gain_automation() {
        let engine = RenderEngine::new(RATE);
        assert_eq!(engine.master_gain(), 0.5);
        engine
            .automate_chain(ChainParam::MasterGain, ParamEvent::SetValueAt { value: 0.9, time: 0.0 })
            .unwrap();
        engine.render_offline(10);
        assert_eq!(engine.master_gain(), 0.9);
    }

    #[test]
    fn test_output_is_bounded_with_heavy_distortion() {
        let engine = RenderEngine::new(RATE);
        engine.set_distortion_curve(Arc::new(WaveshaperCurve::new(100.0))).unwrap();
        for _ in 0..4 {
            engine
                .create_voice(
                    SourceKind::Oscillator { waveform: Waveform::Square, frequency_hz: 200.0 },
                    1.0,
                    0.0,
                )
                .unwrap();
        }
        let block = engine.render_offline(9600);
        assert!(peak(&block) <= 1.5);
        assert!(peak(&block) > 0.1);
    }
}
