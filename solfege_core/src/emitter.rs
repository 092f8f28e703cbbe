//! Gesture events and the sinks that receive them.
//!
//! Events are delivered synchronously, in order, from inside
//! [`GesturePipeline::on_frame`](crate::pipeline::GesturePipeline::on_frame).
//! A sink that needs to cross a thread boundary is an `mpsc::Sender`.

use std::fmt;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing::debug;

use crate::confidence::Solfege;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Enter,
    Leave,
}

/// A sign became active, or stopped being active.  `at` is the frame
/// timestamp, measured from the start of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GestureEvent {
    pub kind:  GestureKind,
    pub class: Solfege,
    pub at:    Duration,
}

impl GestureEvent {
    pub fn enter(class: Solfege, at: Duration) -> Self {
        GestureEvent { kind: GestureKind::Enter, class, at }
    }

    pub fn leave(class: Solfege, at: Duration) -> Self {
        GestureEvent { kind: GestureKind::Leave, class, at }
    }

    pub fn is_enter(&self) -> bool {
        self.kind == GestureKind::Enter
    }
}

impl fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            GestureKind::Enter => "enter",
            GestureKind::Leave => "leave",
        };
        write!(f, "{verb} {} @ {} ms", self.class, self.at.as_millis())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureSink
// ════════════════════════════════════════════════════════════════════════════

pub trait GestureSink {
    fn on_gesture_event(&mut self, event: GestureEvent);
}

/// Collects every event, for tests and offline replay.
impl GestureSink for Vec<GestureEvent> {
    fn on_gesture_event(&mut self, event: GestureEvent) {
        self.push(event);
    }
}

/// Hands events to another thread.  A hung-up receiver drops the event.
impl GestureSink for Sender<GestureEvent> {
    fn on_gesture_event(&mut self, event: GestureEvent) {
        if self.send(event).is_err() {
            debug!(%event, "gesture receiver gone, event dropped");
        }
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(GestureEvent)> GestureSink for FnSink<F> {
    fn on_gesture_event(&mut self, event: GestureEvent) {
        (self.0)(event)
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl GestureSink for NullSink {
    fn on_gesture_event(&mut self, _event: GestureEvent) {}
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn channel_preserves_order() {
        let (mut tx, rx) = mpsc::channel();
        let events = [
            GestureEvent::enter(Solfege::Do, Duration::from_millis(200)),
            GestureEvent::leave(Solfege::Do, Duration::from_millis(400)),
            GestureEvent::enter(Solfege::Re, Duration::from_millis(600)),
        ];
        for e in events {
            tx.on_gesture_event(e);
        }
        drop(tx);
        let got: Vec<GestureEvent> = rx.iter().collect();
        assert_eq!(got, events.to_vec());
    }

    #[test]
    fn hung_up_channel_is_not_fatal() {
        let (mut tx, rx) = mpsc::channel();
        drop(rx);
        tx.on_gesture_event(GestureEvent::enter(Solfege::Mi, Duration::ZERO));
    }

    #[test]
    fn closure_sink_sees_events() {
        let mut count = 0;
        {
            let mut sink = FnSink(|_e: GestureEvent| count += 1);
            sink.on_gesture_event(GestureEvent::enter(Solfege::La, Duration::ZERO));
            sink.on_gesture_event(GestureEvent::leave(Solfege::La, Duration::ZERO));
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn display_is_readable() {
        let e = GestureEvent::leave(Solfege::Sol, Duration::from_millis(1250));
        assert_eq!(e.to_string(), "leave Sol @ 1250 ms");
    }
}
