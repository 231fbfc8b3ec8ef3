mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use common::{JobFixture, COUNTER_XML, LONG_WAIT_XML};
use oac_engine::{AnyValue, ExecutionStatus, JobState, Severity};
use oac_jobs::JobError;
use oac_model::items::{self, BreakpointStatus};

#[test]
fn wait_job_succeeds_and_keeps_variable_values() {
    let mut fixture = JobFixture::local(
        r#"<Procedure>
  <Wait timeout="0"/>
  <Workspace>
    <Local name="a" type='{"type":"uint32"}' value="42"/>
    <Local name="b" type='{"type":"uint32"}' value="43"/>
  </Workspace>
</Procedure>
"#,
    );
    fixture.submit();
    assert_eq!(fixture.item_state(), Some(JobState::Initial));
    fixture.manager.start(fixture.job).unwrap();

    assert_eq!(fixture.wait_for_finished(), Some(JobState::Succeeded));
    assert_eq!(fixture.item_state(), Some(JobState::Succeeded));
    assert_eq!(fixture.value("a"), AnyValue::UInt32(42));
    assert_eq!(fixture.value("b"), AnyValue::UInt32(43));
    let wait = fixture.instructions()[0];
    assert_eq!(
        items::instruction_status(&fixture.model, wait),
        Some(ExecutionStatus::Success)
    );
}

#[test]
fn unbounded_wait_for_finished_returns_the_final_state() {
    let mut fixture = JobFixture::local(COUNTER_XML);
    fixture.submit();
    fixture.manager.start(fixture.job).unwrap();
    let state = fixture
        .manager
        .wait_for_finished(&mut fixture.model, fixture.job, Duration::MAX)
        .unwrap();
    assert_eq!(state, Some(JobState::Succeeded));
    assert_eq!(fixture.value("n"), AnyValue::UInt32(3));
}

#[test]
fn increments_reach_the_expanded_workspace() {
    let mut fixture = JobFixture::local(COUNTER_XML);
    fixture.submit();
    fixture.manager.start(fixture.job).unwrap();
    assert_eq!(fixture.wait_for_finished(), Some(JobState::Succeeded));
    assert_eq!(fixture.value("n"), AnyValue::UInt32(3));
    let variables = items::variable_items(&fixture.model, fixture.expanded()).unwrap();
    assert!(items::is_available(&fixture.model, variables[0]));
}

#[test]
fn reset_restores_initial_values() {
    let mut fixture = JobFixture::local(COUNTER_XML);
    fixture.submit();
    fixture.manager.start(fixture.job).unwrap();
    assert_eq!(fixture.wait_for_finished(), Some(JobState::Succeeded));
    assert_eq!(fixture.value("n"), AnyValue::UInt32(3));

    fixture.manager.reset(fixture.job).unwrap();
    assert!(fixture.pump_until(|f| f.item_state() == Some(JobState::Initial)));
    assert_eq!(fixture.value("n"), AnyValue::UInt32(0));
    let sequence = fixture.instructions()[0];
    assert_eq!(
        items::instruction_status(&fixture.model, sequence),
        Some(ExecutionStatus::NotStarted)
    );
}

#[test]
fn step_runs_one_tick_then_pauses() {
    let mut fixture = JobFixture::local(COUNTER_XML);
    fixture.submit();

    fixture.manager.step(fixture.job).unwrap();
    assert!(fixture.pump_until(|f| f.value("n") == AnyValue::UInt32(1)));
    assert!(fixture.pump_until(|f| f.item_state() == Some(JobState::Paused)));

    fixture.manager.step(fixture.job).unwrap();
    assert!(fixture.pump_until(|f| f.value("n") == AnyValue::UInt32(2)));
    assert!(fixture.pump_until(|f| f.item_state() == Some(JobState::Paused)));

    fixture.manager.start(fixture.job).unwrap();
    assert_eq!(fixture.wait_for_finished(), Some(JobState::Succeeded));
    assert_eq!(fixture.value("n"), AnyValue::UInt32(3));
}

#[test]
fn stop_halts_a_long_wait_and_logs_a_warning() {
    let mut fixture = JobFixture::local(LONG_WAIT_XML);
    fixture.submit();
    fixture.manager.start(fixture.job).unwrap();
    assert!(fixture.pump_until(|f| f.item_state() == Some(JobState::Running)));

    fixture.manager.stop(fixture.job).unwrap();
    assert_eq!(fixture.wait_for_finished(), Some(JobState::Halted));
    let log = fixture.manager.handler(fixture.job).unwrap().log();
    assert!(log
        .entries()
        .iter()
        .any(|entry| entry.severity == Severity::Warning && entry.message == "Stop request"));
}

#[test]
fn running_job_cannot_be_removed() {
    let mut fixture = JobFixture::local(LONG_WAIT_XML);
    fixture.submit();
    fixture.manager.start(fixture.job).unwrap();
    assert!(fixture.pump_until(|f| f.manager.has_running_jobs()));

    let err = fixture
        .manager
        .remove_job(&mut fixture.model, fixture.job)
        .unwrap_err();
    assert_eq!(err, JobError::RunningJob(fixture.job));

    fixture.manager.stop_all_jobs().unwrap();
    assert_eq!(fixture.wait_for_finished(), Some(JobState::Halted));
    assert!(!fixture.manager.handler(fixture.job).unwrap().is_running());
    fixture
        .manager
        .remove_job(&mut fixture.model, fixture.job)
        .unwrap();
    assert!(fixture.manager.handler(fixture.job).is_none());
    assert_eq!(fixture.manager.job_count(), 0);
}

#[test]
fn submission_errors_register_nothing() {
    let mut fixture = JobFixture::local(COUNTER_XML);
    assert_eq!(
        fixture.manager.submit_job(&mut fixture.model, None),
        Err(JobError::UndefinedJob)
    );
    fixture.submit();
    assert_eq!(
        fixture.manager.submit_job(&mut fixture.model, Some(fixture.job)),
        Err(JobError::JobAlreadySubmitted(fixture.job))
    );

    let mut broken = JobFixture::local(
        r#"<Procedure>
  <Increment varName="missing"/>
  <Workspace/>
</Procedure>
"#,
    );
    assert!(broken
        .manager
        .submit_job(&mut broken.model, Some(broken.job))
        .is_err());
    assert_eq!(broken.manager.job_count(), 0);
    assert!(items::expanded_procedure(&broken.model, broken.job).is_none());
}

#[test]
fn breakpoint_pauses_before_the_marked_instruction() {
    let mut fixture = JobFixture::local(COUNTER_XML);
    fixture.submit();
    let second = fixture.instructions()[2];
    let toggled = fixture
        .manager
        .toggle_breakpoint(&mut fixture.model, fixture.job, second)
        .unwrap();
    assert!(toggled);
    assert_eq!(
        items::breakpoint_status(&fixture.model, second),
        BreakpointStatus::Set
    );

    fixture.manager.start(fixture.job).unwrap();
    assert!(fixture.pump_until(|f| {
        f.manager.handler(f.job).unwrap().active_breakpoint() == Some(second)
    }));
    assert!(fixture.pump_until(|f| f.item_state() == Some(JobState::Paused)));
    assert_eq!(fixture.value("n"), AnyValue::UInt32(1));

    fixture.manager.start(fixture.job).unwrap();
    assert_eq!(fixture.wait_for_finished(), Some(JobState::Succeeded));
    assert_eq!(fixture.value("n"), AnyValue::UInt32(3));
}

#[test]
fn active_instructions_are_reported_for_the_active_job_only() {
    let mut fixture = JobFixture::local(COUNTER_XML);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    fixture
        .manager
        .set_active_instruction_callback(move |job, leaves| sink.borrow_mut().push((job, leaves.to_vec())));
    fixture.submit();
    fixture.manager.start(fixture.job).unwrap();
    assert_eq!(fixture.wait_for_finished(), Some(JobState::Succeeded));
    assert!(seen.borrow().is_empty());

    fixture.manager.set_active_job(Some(fixture.job));
    fixture.manager.start(fixture.job).unwrap();
    let observed = Rc::clone(&seen);
    assert!(fixture.pump_until(|_| !observed.borrow().is_empty()));
    let increments = &fixture.instructions()[1..];
    let seen = seen.borrow();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|(job, _)| *job == fixture.job));
    assert!(seen
        .iter()
        .flat_map(|(_, leaves)| leaves.iter())
        .all(|leaf| increments.contains(leaf)));
}
