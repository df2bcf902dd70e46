// ============================================================================
// PARAM.RS - Scheduled Parameter Timelines
// ============================================================================
//
// Every gain, cutoff and depth in the player is an AudioParam: a value that
// can be told what to do in the future instead of being set right now.
//
// EVENT TYPES:
// - SetValueAt:     jump to a value at a time
// - LinearRampTo:   glide in a straight line, ending at a time
// - SetTargetAt:    start an exponential approach toward a target
//                   (first-order lag with a time constant, never "arrives")
// - CancelAndHold:  drop everything from a time on and freeze the value the
//                   timeline had at that moment
//
// A linear ramp starts where the previous event left off: at the later of
// "when it was scheduled" and "the previous event's time". That makes
// set -> ramp -> ramp chains (attack then decay) behave as expected.
//
// The render thread reads value_at() for every sample and calls prune()
// once per block so finished events get folded into the base state.
// ============================================================================

use crate::helper::{exponential_approach, lerp};

// ============================================================================
// PUBLIC EVENT TYPE
// ============================================================================

/// One automation instruction for a parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `time`
    SetValueAt { value: f32, time: f64 },

    /// Ramp linearly from the previous value, reaching `value` at `end_time`
    LinearRampTo { value: f32, end_time: f64 },

    /// From `start_time` on, approach `target` exponentially
    SetTargetAt {
        target: f32,
        start_time: f64,
        time_constant: f64,
    },

    /// Remove events at or after `time` and hold the value reached there
    CancelAndHold { time: f64 },
}

// ============================================================================
// INTERNAL STATE
// ============================================================================

/// An exponential approach in progress
#[derive(Clone, Copy, Debug, PartialEq)]
struct Approach {
    start_time: f64,
    start_value: f32,
    target: f32,
    time_constant: f64,
}

/// Everything known about the parameter up to `time`
#[derive(Clone, Copy, Debug, PartialEq)]
struct ParamState {
    value: f32,
    time: f64,
    approach: Option<Approach>,
}

impl ParamState {
    fn at(&self, t: f64) -> f32 {
        match self.approach {
            Some(a) => exponential_approach(
                a.start_value,
                a.target,
                (t - a.start_time).max(0.0),
                a.time_constant,
            ),
            None => self.value,
        }
    }

    /// State right after `event` has fully happened
    fn after(&self, event: &Scheduled) -> ParamState {
        match *event {
            Scheduled::Set { time, value } => ParamState { value, time, approach: None },
            Scheduled::Ramp { end_time, value, .. } => ParamState {
                value,
                time: end_time,
                approach: None,
            },
            Scheduled::Target { start_time, target, time_constant } => {
                let start_value = self.at(start_time);
                ParamState {
                    value: start_value,
                    time: start_time,
                    approach: Some(Approach {
                        start_time,
                        start_value,
                        target,
                        time_constant,
                    }),
                }
            }
        }
    }
}

/// A queued event with its ramp start resolved
#[derive(Clone, Copy, Debug, PartialEq)]
enum Scheduled {
    Set { time: f64, value: f32 },
    Ramp { start_time: f64, end_time: f64, value: f32 },
    Target { start_time: f64, target: f32, time_constant: f64 },
}

impl Scheduled {
    /// Ordering key: when the event "happens"
    fn time(&self) -> f64 {
        match *self {
            Scheduled::Set { time, .. } => time,
            Scheduled::Ramp { end_time, .. } => end_time,
            Scheduled::Target { start_time, .. } => start_time,
        }
    }
}

// ============================================================================
// AUDIO PARAM
// ============================================================================

/// A parameter value with a timeline of scheduled changes
#[derive(Clone, Debug, PartialEq)]
pub struct AudioParam {
    base: ParamState,
    events: Vec<Scheduled>,
}

impl AudioParam {
    /// Creates a parameter holding `value` from time zero
    pub fn new(value: f32) -> Self {
        Self {
            base: ParamState { value, time: 0.0, approach: None },
            events: Vec::new(),
        }
    }

    /// Number of events still waiting to complete
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Adds an event; `now` is the clock time at which it is being scheduled
    pub fn schedule(&mut self, event: ParamEvent, now: f64) {
        match event {
            ParamEvent::SetValueAt { value, time } => {
                self.insert(Scheduled::Set { time, value });
            }
            ParamEvent::LinearRampTo { value, end_time } => {
                let previous = self
                    .events
                    .iter()
                    .map(Scheduled::time)
                    .filter(|t| *t <= end_time)
                    .fold(self.base.time, f64::max);
                let start_time = previous.max(now).min(end_time);
                self.insert(Scheduled::Ramp { start_time, end_time, value });
            }
            ParamEvent::SetTargetAt { target, start_time, time_constant } => {
                self.insert(Scheduled::Target { start_time, target, time_constant });
            }
            ParamEvent::CancelAndHold { time } => {
                let held = self.value_at(time);
                self.events.retain(|e| e.time() < time);
                self.insert(Scheduled::Set { time, value: held });
            }
        }
    }

    /// Keeps the list sorted by event time; equal times keep insertion order
    fn insert(&mut self, event: Scheduled) {
        let position = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(position, event);
    }

    /// Evaluates the timeline at time `t`
    pub fn value_at(&self, t: f64) -> f32 {
        let mut state = self.base;

        for event in &self.events {
            match *event {
                Scheduled::Set { time, .. } | Scheduled::Target { start_time: time, .. } => {
                    if t < time {
                        return state.at(t);
                    }
                }
                Scheduled::Ramp { start_time, end_time, value } => {
                    if t < start_time {
                        return state.at(t);
                    }
                    if t < end_time {
                        let from = state.at(start_time);
                        let progress = ((t - start_time) / (end_time - start_time)) as f32;
                        return lerp(from, value, progress);
                    }
                }
            }
            state = state.after(event);
        }

        state.at(t)
    }

    /// Folds every event that has completed by `now` into the base state
    pub fn prune(&mut self, now: f64) {
        let finished = self.events.partition_point(|e| e.time() <= now);
        for event in self.events.drain(..finished) {
            self.base = self.base.after(&event);
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_constant_value() {
        let param = AudioParam::new(0.5);
        assert_eq!(param.value_at(0.0), 0.5);
        assert_eq!(param.value_at(100.0), 0.5);
    }

    #[test]
    fn test_set_then_ramp_attack() {
        let mut param = AudioParam::new(0.0);
        param.schedule(ParamEvent::SetValueAt { value: 0.001, time: 1.0 }, 1.0);
        param.schedule(ParamEvent::LinearRampTo { value: 0.3, end_time: 1.05 }, 1.0);

        assert!(close(param.value_at(0.5), 0.0));
        assert!(close(param.value_at(1.0), 0.001));
        assert!(close(param.value_at(1.025), (0.001 + 0.3) / 2.0));
        assert!(close(param.value_at(1.05), 0.3));
        assert!(close(param.value_at(2.0), 0.3));
    }

    #[test]
    fn test_chained_ramps_start_at_previous_event() {
        let mut param = AudioParam::new(0.0);
        param.schedule(ParamEvent::SetValueAt { value: 0.001, time: 0.0 }, 0.0);
        param.schedule(ParamEvent::LinearRampTo { value: 0.3, end_time: 0.02 }, 0.0);
        param.schedule(ParamEvent::LinearRampTo { value: 0.0001, end_time: 0.15 }, 0.0);

        assert!(close(param.value_at(0.02), 0.3));
        let mid = param.value_at(0.085);
        assert!(close(mid, (0.3 + 0.0001) / 2.0));
        assert!(close(param.value_at(0.15), 0.0001));
    }

    #[test]
    fn test_ramp_starts_no_earlier_than_scheduling_time() {
        let mut param = AudioParam::new(0.3);
        param.schedule(ParamEvent::LinearRampTo { value: 0.0, end_time: 2.05 }, 2.0);

        assert!(close(param.value_at(1.0), 0.3));
        assert!(close(param.value_at(2.0), 0.3));
        assert!(close(param.value_at(2.025), 0.15));
    }

    #[test]
    fn test_set_target_approaches_exponentially() {
        let mut param = AudioParam::new(0.0);
        param.schedule(
            ParamEvent::SetTargetAt { target: 1.0, start_time: 0.0, time_constant: 0.1 },
            0.0,
        );
        assert!(close(param.value_at(0.1), 0.6321));
        assert!(param.value_at(1.0) > 0.9999);
    }

    #[test]
    fn test_cancel_and_hold_freezes_mid_ramp() {
        let mut param = AudioParam::new(0.0);
        param.schedule(ParamEvent::LinearRampTo { value: 1.0, end_time: 1.0 }, 0.0);
        param.schedule(ParamEvent::CancelAndHold { time: 0.5 }, 0.5);

        assert!(close(param.value_at(0.5), 0.5));
        assert!(close(param.value_at(0.9), 0.5));
        assert_eq!(param.pending_events(), 1);
    }

    #[test]
    fn test_later_write_wins_after_hold() {
        let mut param = AudioParam::new(0.5);
        // A slow ramp, then a newer target issued at the same moment
        param.schedule(ParamEvent::LinearRampTo { value: 1.0, end_time: 0.1 }, 0.0);
        param.schedule(ParamEvent::CancelAndHold { time: 0.0 }, 0.0);
        param.schedule(
            ParamEvent::SetTargetAt { target: 0.2, start_time: 0.0, time_constant: 0.1 },
            0.0,
        );
        assert!(close(param.value_at(5.0), 0.2));
    }

    #[test]
    fn test_prune_keeps_values_identical() {
        let mut param = AudioParam::new(0.0);
        param.schedule(ParamEvent::SetValueAt { value: 0.001, time: 0.0 }, 0.0);
        param.schedule(ParamEvent::LinearRampTo { value: 0.3, end_time: 0.05 }, 0.0);
        param.schedule(
            ParamEvent::SetTargetAt { target: 0.0, start_time: 0.1, time_constant: 0.1 },
            0.0,
        );
        let before: Vec<f32> = (0..40).map(|i| param.value_at(i as f64 * 0.01)).collect();

        param.prune(0.12);
        assert_eq!(param.pending_events(), 0);
        for (i, expected) in before.iter().enumerate().skip(12) {
            assert!(close(param.value_at(i as f64 * 0.01), *expected));
        }
    }
}
