//! Synchronous batch runner: one submission, acknowledgement in the reply.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::core::dimension::{Outcome, Transport};
use crate::core::response::{parse_acknowledgement, submission_outcome};
use crate::core::scenario::Scenario;
use crate::core::verdict::expect_outcome;
use crate::runners::{
    ScenarioRunner, stage_preconditions, unsupported, update_text, verify_postconditions,
};

pub struct BatchRunner<'c> {
    context: &'c ExecutionContext,
}

impl<'c> BatchRunner<'c> {
    pub fn new(context: &'c ExecutionContext) -> Self {
        Self { context }
    }

    #[instrument(skip_all, fields(transport = "sync_batch", operation = scenario.operation().name()))]
    fn submit(&self, scenario: &Scenario) -> Result<()> {
        let content = self.context.submission(update_text(self.context, scenario));
        let reply = self
            .context
            .batch()
            .submit(&content, self.context.timeout())?;
        let acks = parse_acknowledgement(&reply.report);
        debug!(status = reply.status, acks = acks.len(), "batch acknowledged");
        let observed = if (200..300).contains(&reply.status) {
            submission_outcome(&acks, scenario.operation(), &self.context.record().key)
        } else {
            Outcome::Failure
        };
        expect_outcome(
            scenario,
            observed,
            format!("status {}, {} acknowledgement lines", reply.status, acks.len()),
        )?;
        Ok(())
    }
}

impl ScenarioRunner for BatchRunner<'_> {
    fn transport(&self) -> Transport {
        Transport::SyncBatch
    }

    fn before(&mut self, scenario: &Scenario) -> Result<()> {
        stage_preconditions(self.context, scenario)
    }

    fn after(&mut self, scenario: &Scenario) -> Result<()> {
        verify_postconditions(self.context, scenario)
    }

    fn create(&mut self, scenario: &Scenario) -> Result<()> {
        self.submit(scenario)
    }

    fn modify(&mut self, scenario: &Scenario) -> Result<()> {
        self.submit(scenario)
    }

    fn delete(&mut self, scenario: &Scenario) -> Result<()> {
        self.submit(scenario)
    }

    fn search(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    fn fetch(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    fn metadata_fetch(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    fn event_notify(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }
}
