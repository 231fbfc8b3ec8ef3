#![allow(dead_code)]

use std::time::{Duration, Instant};

use oac_engine::{AnyValue, JobState};
use oac_jobs::{JobContext, JobManager};
use oac_model::anyvalue_items::variable_value;
use oac_model::items::{self, tags};
use oac_model::xml::import_procedure;
use oac_model::{ItemId, SessionModel};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// One imported procedure and a local job item pointing at it.
pub struct JobFixture {
    pub model: SessionModel,
    pub manager: JobManager,
    pub procedure: ItemId,
    pub job: ItemId,
}

impl JobFixture {
    pub fn local(xml: &str) -> Self {
        Self::with_manager(xml, JobManager::new(JobContext::standard()))
    }

    pub fn with_manager(xml: &str, manager: JobManager) -> Self {
        let mut model = SessionModel::new();
        let root = model.root();
        let procedure = import_procedure(
            xml,
            &mut model,
            &manager.context().catalogue,
            root,
            tags::PROCEDURES,
        )
        .expect("import procedure");
        let job = items::create_local_job(&mut model, procedure).expect("job item");
        Self {
            model,
            manager,
            procedure,
            job,
        }
    }

    pub fn submit(&mut self) {
        self.manager
            .submit_job(&mut self.model, Some(self.job))
            .expect("submit job");
    }

    pub fn expanded(&self) -> ItemId {
        items::expanded_procedure(&self.model, self.job).expect("expanded procedure")
    }

    /// Expanded instruction items, depth first.
    pub fn instructions(&self) -> Vec<ItemId> {
        items::all_instructions(&self.model, self.expanded()).expect("instructions")
    }

    /// Value shown by the expanded procedure's variable `name`.
    pub fn value(&self, name: &str) -> AnyValue {
        let workspace = items::workspace_item(&self.model, self.expanded()).expect("workspace");
        let variable =
            items::find_variable_by_name(&self.model, workspace, name).expect("variable item");
        variable_value(&self.model, variable).expect("variable value")
    }

    pub fn item_state(&self) -> Option<JobState> {
        items::job_state(&self.model, self.job)
    }

    /// Processes events until `done` holds or [`TIMEOUT`] passes.
    pub fn pump_until(&mut self, mut done: impl FnMut(&Self) -> bool) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            self.manager.process_events(&mut self.model);
            if done(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    pub fn wait_for_finished(&mut self) -> Option<JobState> {
        self.manager
            .wait_for_finished(&mut self.model, self.job, TIMEOUT)
            .expect("wait for job")
    }
}

/// `Sequence` of three increments of `n`, starting at zero.
pub const COUNTER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Procedure>
  <Sequence>
    <Increment varName="n"/>
    <Increment varName="n"/>
    <Increment varName="n"/>
  </Sequence>
  <Workspace>
    <Local name="n" type='{"type":"uint32"}' value="0"/>
  </Workspace>
</Procedure>
"#;

pub const LONG_WAIT_XML: &str = r#"<Procedure>
  <Wait timeout="60"/>
  <Workspace/>
</Procedure>
"#;
