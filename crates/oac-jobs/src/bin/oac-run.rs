//! Run an oac-tree procedure headless.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use oac_engine::JobState;
use oac_jobs::{JobContext, JobManager, RunnerConfig};
use oac_model::anyvalue_items::variable_value;
use oac_model::items::{self, props, tags};
use oac_model::xml::import_procedure;
use oac_model::SessionModel;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "oac-run", version, about = "Run an oac-tree procedure and print its log")]
struct Args {
    /// Procedure XML file.
    procedure: PathBuf,

    /// Runner configuration (TOML).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pause between ticks, overriding the configuration.
    #[arg(long, value_name = "MS")]
    tick_timeout_ms: Option<u64>,

    /// Give up after this many seconds.
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    timeout: u64,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level.as_tracing()
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let xml = std::fs::read_to_string(&args.procedure)
        .with_context(|| format!("cannot read {}", args.procedure.display()))?;
    let mut context = JobContext::from_config(&config);
    if let Some(ms) = args.tick_timeout_ms {
        context.tick_timeout = Duration::from_millis(ms);
    }

    let mut model = SessionModel::new();
    let root = model.root();
    let procedure = import_procedure(&xml, &mut model, &context.catalogue, root, tags::PROCEDURES)?;
    let job = items::create_local_job(&mut model, procedure)?;

    let mut manager = JobManager::new(context);
    manager.submit_job(&mut model, Some(job))?;
    info!(procedure = %args.procedure.display(), "starting job");
    manager.start(job)?;
    let finished = manager.wait_for_finished(&mut model, job, Duration::from_secs(args.timeout))?;

    if let Some(handler) = manager.handler(job) {
        for entry in handler.log().entries() {
            println!("{entry}");
        }
        for variable in items::variable_items(&model, handler.expanded_procedure())? {
            let name = items::variable_name(&model, variable).unwrap_or_default();
            let value = variable_value(&model, variable)?;
            let available = model.bool_data(variable, props::IS_AVAILABLE).unwrap_or(false);
            println!(
                "{name} = {}{}",
                value.to_json_string(),
                if available { "" } else { " (unavailable)" }
            );
        }
    }

    match finished {
        Some(JobState::Succeeded) => Ok(()),
        Some(state) => bail!("job finished in state {state}"),
        None => {
            manager.stop_all_jobs()?;
            bail!("job did not finish within {}s", args.timeout)
        }
    }
}
