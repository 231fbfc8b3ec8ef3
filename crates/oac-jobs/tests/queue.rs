use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use oac_engine::{ExecutionStatus, InstructionHandle, InstructionRegistry, JobState};
use oac_jobs::{event_channel, DomainEvent, DomainEventHandler};

#[derive(Debug, Default)]
struct Recorder(Vec<DomainEvent>);

impl DomainEventHandler for Recorder {
    fn instruction_state_updated(&mut self, handle: InstructionHandle, status: ExecutionStatus) {
        self.0.push(DomainEvent::InstructionStateUpdated { handle, status });
    }

    fn job_state_changed(&mut self, state: JobState) {
        self.0.push(DomainEvent::JobStateChanged(state));
    }
}

#[test]
fn scripted_events_are_dispatched_in_push_order() {
    let handle = InstructionRegistry::with_standard()
        .create("Wait")
        .unwrap()
        .handle();
    let script = vec![
        DomainEvent::JobStateChanged(JobState::Running),
        DomainEvent::InstructionStateUpdated {
            handle,
            status: ExecutionStatus::Running,
        },
        DomainEvent::InstructionStateUpdated {
            handle,
            status: ExecutionStatus::Success,
        },
        DomainEvent::JobStateChanged(JobState::Succeeded),
    ];

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let (sender, dispatcher) = event_channel(Some(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })));
    let pushed = script.clone();
    thread::spawn(move || {
        for event in pushed {
            sender.push(event);
        }
    })
    .join()
    .unwrap();

    let mut recorder = Recorder::default();
    assert_eq!(dispatcher.process_events(&mut recorder), 4);
    assert_eq!(recorder.0, script);
    assert_eq!(notified.load(Ordering::SeqCst), 4);
}

#[test]
fn consumer_wakes_for_events_from_another_thread() {
    let (sender, dispatcher) = event_channel(None);
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        sender.push(DomainEvent::JobStateChanged(JobState::Running));
        sender.push(DomainEvent::JobStateChanged(JobState::Halted));
    });
    let mut recorder = Recorder::default();
    let mut handled = 0;
    while handled < 2 {
        let count = dispatcher.wait_and_process(&mut recorder, Duration::from_secs(10));
        assert!(count > 0, "no event within timeout");
        handled += count;
    }
    producer.join().unwrap();
    assert_eq!(
        recorder.0,
        [
            DomainEvent::JobStateChanged(JobState::Running),
            DomainEvent::JobStateChanged(JobState::Halted),
        ]
    );
}
