//! Running a scenario: resolve, `before`, one operation, `after`.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::context::ExecutionContext;
use crate::core::dimension::Operation;
use crate::core::scenario::Scenario;
use crate::runners::ScenarioRunner;

impl Scenario {
    /// Run this scenario against the system behind `context`.
    ///
    /// The runner comes from the context's provider. Errors from `before`, the
    /// operation or `after` are returned as they are. When `before` or the
    /// operation fails, `after` does not run and the record is left as the
    /// failure found it.
    #[instrument(skip_all, fields(scenario = %self))]
    pub fn run(&self, context: &ExecutionContext) -> Result<()> {
        let mut runner = context.provider().resolve(self.transport(), context);

        if let Err(err) = runner.before(self) {
            warn!(step = "before", "skipping operation and after");
            return Err(err);
        }
        if let Err(err) = dispatch(runner.as_mut(), self) {
            warn!(step = self.operation().name(), "skipping after");
            return Err(err);
        }
        runner.after(self)?;
        info!("scenario passed");
        Ok(())
    }
}

fn dispatch(runner: &mut dyn ScenarioRunner, scenario: &Scenario) -> Result<()> {
    match scenario.operation() {
        Operation::Create => runner.create(scenario),
        Operation::Modify => runner.modify(scenario),
        Operation::Delete => runner.delete(scenario),
        Operation::Search => runner.search(scenario),
        Operation::Fetch => runner.fetch(scenario),
        Operation::MetadataFetch => runner.metadata_fetch(scenario),
        Operation::EventNotify => runner.event_notify(scenario),
    }
}
