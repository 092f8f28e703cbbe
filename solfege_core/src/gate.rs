//! Stability gate: debounces per-frame confidences into enter/leave events.
//!
//! | State | Top class | Next | Emits |
//! |---|---|---|---|
//! | any | none | `Idle` | `Leave(c)` if it was `Active(c)` |
//! | `Idle` | `c` | `Candidate(c, now)` | |
//! | `Candidate(o, _)` | `c ≠ o` | `Candidate(c, now)` | |
//! | `Candidate(c, since)` | `c`, held ≥ delay | `Active(c)` | `Enter(c)` |
//! | `Active(c)` | `c` | `Active(c)` | |
//! | `Active(c)` | `c' ≠ c` | `Candidate(c', now)` | `Leave(c)` |
//!
//! A fresh candidate is checked for promotion in the same update, so a zero
//! hold delay enters on the first frame.

use std::time::Duration;

use tracing::{debug, info};

use crate::confidence::{ConfidenceVector, Solfege};
use crate::emitter::{GestureEvent, GestureSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Candidate { class: Solfege, since: Duration },
    Active(Solfege),
}

#[derive(Clone, Debug)]
pub struct StabilityGate {
    threshold:  f32,
    hold_delay: Duration,
    state:      GateState,
}

impl StabilityGate {
    pub fn new(threshold: f32, hold_delay: Duration) -> Self {
        StabilityGate { threshold, hold_delay, state: GateState::Idle }
    }

    pub fn state(&self) -> GateState { self.state }

    pub fn threshold(&self) -> f32 { self.threshold }

    pub fn hold_delay(&self) -> Duration { self.hold_delay }

    pub fn active(&self) -> Option<Solfege> {
        match self.state {
            GateState::Active(c) => Some(c),
            _ => None,
        }
    }

    /// Arg-max class, if it strictly exceeds the detection threshold.
    pub fn top_class(&self, confidences: &ConfidenceVector) -> Option<Solfege> {
        let (class, value) = confidences.top();
        (value > self.threshold).then_some(class)
    }

    /// Advance the state machine by one frame.  `None` means no hand.
    pub fn update(
        &mut self,
        confidences: Option<&ConfidenceVector>,
        now:         Duration,
        sink:        &mut dyn GestureSink,
    ) {
        let top = confidences.and_then(|v| self.top_class(v));

        match (self.state, top) {
            (_, None) => self.reset(now, sink),
            (GateState::Active(c), Some(t)) if t == c => {}
            (GateState::Active(c), Some(t)) => {
                emit(sink, GestureEvent::leave(c, now));
                self.start_candidate(t, now, sink);
            }
            (GateState::Candidate { class, .. }, Some(t)) if t == class => {
                self.try_promote(now, sink);
            }
            (GateState::Idle | GateState::Candidate { .. }, Some(t)) => {
                self.start_candidate(t, now, sink);
            }
        }
    }

    /// Return to `Idle`, leaving any active sign.
    pub fn reset(&mut self, now: Duration, sink: &mut dyn GestureSink) {
        if let GateState::Active(c) = self.state {
            emit(sink, GestureEvent::leave(c, now));
        }
        if self.state != GateState::Idle {
            debug!(from = ?self.state, "gate idle");
        }
        self.state = GateState::Idle;
    }

    fn start_candidate(&mut self, class: Solfege, now: Duration, sink: &mut dyn GestureSink) {
        debug!(%class, at_ms = now.as_millis() as u64, "candidate");
        self.state = GateState::Candidate { class, since: now };
        self.try_promote(now, sink);
    }

    fn try_promote(&mut self, now: Duration, sink: &mut dyn GestureSink) {
        if let GateState::Candidate { class, since } = self.state {
            if now.saturating_sub(since) >= self.hold_delay {
                self.state = GateState::Active(class);
                emit(sink, GestureEvent::enter(class, now));
            }
        }
    }
}

fn emit(sink: &mut dyn GestureSink, event: GestureEvent) {
    info!(%event, "gesture");
    sink.on_gesture_event(event);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn gate() -> StabilityGate {
        StabilityGate::new(0.7, ms(200))
    }

    fn only(class: Solfege, v: f32) -> ConfidenceVector {
        ConfidenceVector::single(class, v)
    }

    #[test]
    fn threshold_is_strict() {
        let g = gate();
        assert_eq!(g.top_class(&only(Solfege::Do, 0.7)), None);
        assert_eq!(g.top_class(&only(Solfege::Do, 0.71)), Some(Solfege::Do));
    }

    #[test]
    fn enter_after_hold_delay() {
        let mut g = gate();
        let mut events = Vec::new();
        let v = only(Solfege::Fa, 0.9);
        g.update(Some(&v), ms(0), &mut events);
        g.update(Some(&v), ms(100), &mut events);
        assert!(events.is_empty());
        assert_eq!(g.state(), GateState::Candidate { class: Solfege::Fa, since: ms(0) });
        g.update(Some(&v), ms(200), &mut events);
        assert_eq!(events, vec![GestureEvent::enter(Solfege::Fa, ms(200))]);
        g.update(Some(&v), ms(300), &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn switching_one_ms_early_never_enters() {
        let mut g = gate();
        let mut events = Vec::new();
        g.update(Some(&only(Solfege::Re, 0.9)), ms(0), &mut events);
        g.update(Some(&only(Solfege::Re, 0.9)), ms(199), &mut events);
        g.update(Some(&only(Solfege::Mi, 0.9)), ms(200), &mut events);
        assert!(events.is_empty());
        assert_eq!(g.state(), GateState::Candidate { class: Solfege::Mi, since: ms(200) });
    }

    #[test]
    fn switching_while_active_leaves_then_waits() {
        let mut g = gate();
        let mut events = Vec::new();
        g.update(Some(&only(Solfege::Do, 0.9)), ms(0), &mut events);
        g.update(Some(&only(Solfege::Do, 0.9)), ms(250), &mut events);
        g.update(Some(&only(Solfege::Re, 0.9)), ms(300), &mut events);
        assert_eq!(
            events,
            vec![
                GestureEvent::enter(Solfege::Do, ms(250)),
                GestureEvent::leave(Solfege::Do, ms(300)),
            ]
        );
        assert_eq!(g.state(), GateState::Candidate { class: Solfege::Re, since: ms(300) });
    }

    #[test]
    fn zero_hold_enters_immediately() {
        let mut g = StabilityGate::new(0.7, Duration::ZERO);
        let mut events = Vec::new();
        g.update(Some(&only(Solfege::Sol, 0.9)), ms(10), &mut events);
        g.update(Some(&only(Solfege::La, 0.9)), ms(20), &mut events);
        assert_eq!(
            events,
            vec![
                GestureEvent::enter(Solfege::Sol, ms(10)),
                GestureEvent::leave(Solfege::Sol, ms(20)),
                GestureEvent::enter(Solfege::La, ms(20)),
            ]
        );
    }

    #[test]
    fn no_hand_leaves_active_sign() {
        let mut g = StabilityGate::new(0.7, Duration::ZERO);
        let mut events = Vec::new();
        g.update(Some(&only(Solfege::Ti, 0.9)), ms(0), &mut events);
        g.update(None, ms(50), &mut events);
        assert_eq!(events.last(), Some(&GestureEvent::leave(Solfege::Ti, ms(50))));
        assert_eq!(g.state(), GateState::Idle);
    }

    #[test]
    fn low_confidence_counts_as_no_hand() {
        let mut g = gate();
        let mut events = Vec::new();
        g.update(Some(&only(Solfege::Do, 0.9)), ms(0), &mut events);
        g.update(Some(&only(Solfege::Do, 0.3)), ms(100), &mut events);
        assert_eq!(g.state(), GateState::Idle);
        assert!(events.is_empty());
    }

    #[test]
    fn oscillation_yields_nothing() {
        let mut g = gate();
        let mut events = Vec::new();
        for i in 0..60u64 {
            let class = if i % 2 == 0 { Solfege::Do } else { Solfege::Re };
            g.update(Some(&only(class, 0.95)), ms(i * 33), &mut events);
        }
        assert!(events.is_empty());
    }
}
