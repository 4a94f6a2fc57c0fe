//! Asynchronous submission runner.
//!
//! The update is mailed and the runner polls for the acknowledgement until
//! the operation deadline. No acknowledgement at all is an environment error,
//! not an observed failure: the backend answers rejected updates too.

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::core::budget::remaining_budget;
use crate::core::dimension::Transport;
use crate::core::response::{parse_acknowledgement, submission_outcome};
use crate::core::scenario::Scenario;
use crate::core::verdict::expect_outcome;
use crate::io::mail::MailMessage;
use crate::io::poll::poll_until;
use crate::runners::{
    ScenarioRunner, stage_preconditions, unsupported, update_text, verify_postconditions,
};

pub struct MailRunner<'c> {
    context: &'c ExecutionContext,
}

impl<'c> MailRunner<'c> {
    pub fn new(context: &'c ExecutionContext) -> Self {
        Self { context }
    }

    #[instrument(skip_all, fields(transport = "async_submission", operation = scenario.operation().name()))]
    fn submit(&self, scenario: &Scenario) -> Result<()> {
        let deadline = self.context.deadline();
        let settings = self.context.settings();
        let message = MailMessage::new(
            &settings.mail_from,
            &settings.mail_to,
            &settings.mail_subject,
            self.context.submission(update_text(self.context, scenario)),
        );
        let mail = self.context.mail();
        mail.submit(&message, remaining_budget(deadline)?)?;

        let Some(report) = poll_until(deadline, self.context.poll_interval(), || {
            mail.acknowledgement(&message.message_id)
        })?
        else {
            bail!(
                "no acknowledgement for {} within {}s",
                message.message_id,
                self.context.timeout().as_secs()
            );
        };
        let acks = parse_acknowledgement(&report);
        debug!(acks = acks.len(), "mail acknowledged");
        expect_outcome(
            scenario,
            submission_outcome(&acks, scenario.operation(), &self.context.record().key),
            format!("acknowledgement for {} has {} lines", message.message_id, acks.len()),
        )?;
        Ok(())
    }
}

impl ScenarioRunner for MailRunner<'_> {
    fn transport(&self) -> Transport {
        Transport::AsyncSubmission
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
