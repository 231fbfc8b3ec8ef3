//! Domain event queue and dispatcher.
//!
//! The job thread pushes through an [`EventSender`]; exactly one
//! [`DomainEventDispatcher`] owns the receiving end and hands events to a
//! [`DomainEventHandler`] in push order.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use oac_engine::{AnyValue, ExecutionStatus, InstructionHandle, JobState, LogEntry};

use crate::events::DomainEvent;

/// Called after every push, from the pushing thread.
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Creates a queue. `notifier`, when given, is called after each push so
/// the consumer side can schedule a [`DomainEventDispatcher::process_events`]
/// turn.
#[must_use]
pub fn event_channel(notifier: Option<Notifier>) -> (EventSender, DomainEventDispatcher) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (
        EventSender { sender, notifier },
        DomainEventDispatcher { receiver },
    )
}

#[derive(Clone)]
pub struct EventSender {
    sender: Sender<DomainEvent>,
    notifier: Option<Notifier>,
}

impl EventSender {
    /// Queues `event`. A dropped dispatcher makes this a no-op.
    pub fn push(&self, event: DomainEvent) {
        let kind = event.kind();
        if self.sender.send(event).is_err() {
            tracing::debug!(event = kind, "event queue closed; event dropped");
            return;
        }
        if let Some(notifier) = &self.notifier {
            notifier();
        }
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("pending", &self.sender.len())
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}

/// Typed sink for dispatched events. Every method defaults to a no-op.
pub trait DomainEventHandler {
    fn instruction_state_updated(&mut self, _handle: InstructionHandle, _status: ExecutionStatus) {}

    fn variable_updated(&mut self, _name: &str, _value: &AnyValue, _connected: bool) {}

    fn job_state_changed(&mut self, _state: JobState) {}

    fn log_event(&mut self, _entry: &LogEntry) {}

    fn next_leaves_changed(&mut self, _leaves: &[InstructionHandle]) {}

    fn breakpoint_hit(&mut self, _handle: InstructionHandle) {}
}

/// Single consumer of one event queue.
#[derive(Debug)]
pub struct DomainEventDispatcher {
    receiver: Receiver<DomainEvent>,
}

impl DomainEventDispatcher {
    /// Events waiting to be dispatched.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Dispatches everything currently queued; returns the number of events.
    pub fn process_events(&self, handler: &mut impl DomainEventHandler) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            dispatch(&event, handler);
            count += 1;
        }
        count
    }

    /// Blocks up to `timeout` for the next event, then drains the queue.
    pub fn wait_and_process(
        &self,
        handler: &mut impl DomainEventHandler,
        timeout: Duration,
    ) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => {
                dispatch(&event, handler);
                1 + self.process_events(handler)
            }
            Err(_) => 0,
        }
    }
}

fn dispatch(event: &DomainEvent, handler: &mut impl DomainEventHandler) {
    match event {
        DomainEvent::InstructionStateUpdated { handle, status } => {
            handler.instruction_state_updated(*handle, *status);
        }
        DomainEvent::VariableUpdated {
            name,
            value,
            connected,
        } => handler.variable_updated(name, value, *connected),
        DomainEvent::JobStateChanged(state) => handler.job_state_changed(*state),
        DomainEvent::LogEvent(entry) => handler.log_event(entry),
        DomainEvent::NextLeavesChanged(leaves) => handler.next_leaves_changed(leaves),
        DomainEvent::BreakpointHit(handle) => handler.breakpoint_hit(*handle),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use oac_engine::Severity;

    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl DomainEventHandler for Recorder {
        fn job_state_changed(&mut self, state: JobState) {
            self.0.push(format!("job {state}"));
        }

        fn log_event(&mut self, entry: &LogEntry) {
            self.0.push(format!("log {}", entry.message));
        }
    }

    #[test]
    fn notifier_fires_per_push() {
        let pushes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pushes);
        let (sender, dispatcher) = event_channel(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        sender.push(DomainEvent::JobStateChanged(JobState::Running));
        sender.push(DomainEvent::LogEvent(LogEntry::new(Severity::Info, "hi")));
        assert_eq!(pushes.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.pending(), 2);

        let mut recorder = Recorder::default();
        assert_eq!(dispatcher.process_events(&mut recorder), 2);
        assert_eq!(recorder.0, ["job Running", "log hi"]);
        assert_eq!(dispatcher.process_events(&mut recorder), 0);
    }

    #[test]
    fn push_after_dispatcher_drop_is_ignored() {
        let (sender, dispatcher) = event_channel(None);
        drop(dispatcher);
        sender.push(DomainEvent::JobStateChanged(JobState::Halted));
    }

    #[test]
    fn wait_times_out_on_empty_queue() {
        let (_sender, dispatcher) = event_channel(None);
        let mut recorder = Recorder::default();
        assert_eq!(
            dispatcher.wait_and_process(&mut recorder, Duration::from_millis(10)),
            0
        );
    }
}
