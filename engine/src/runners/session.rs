//! Interactive session runner: read-only query lines, textual replies.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::core::dimension::{Outcome, Transport};
use crate::core::record::attribute_name;
use crate::core::response::{QueryResponse, parse_query_response};
use crate::core::scenario::Scenario;
use crate::core::verdict::expect_outcome;
use crate::runners::{ScenarioRunner, stage_preconditions, unsupported, verify_postconditions};

pub struct SessionRunner<'c> {
    context: &'c ExecutionContext,
}

impl<'c> SessionRunner<'c> {
    pub fn new(context: &'c ExecutionContext) -> Self {
        Self { context }
    }

    fn query(&self, line: &str) -> Result<QueryResponse> {
        let reply = self.context.session().query(line, self.context.timeout())?;
        let response = parse_query_response(&reply);
        debug!(
            query = line,
            objects = response.objects.len(),
            errors = response.errors.len(),
            "session replied"
        );
        Ok(response)
    }

    /// Success when the reply holds the record and no error line.
    fn lookup(&self, scenario: &Scenario, line: &str) -> Result<()> {
        let response = self.query(line)?;
        let found = response.errors.is_empty() && response.find(self.context.record()).is_some();
        expect_outcome(
            scenario,
            Outcome::from_success(found),
            describe(line, &response, found),
        )?;
        Ok(())
    }
}

fn describe(line: &str, response: &QueryResponse, found: bool) -> String {
    match response.errors.first() {
        Some(error) => format!("`{line}` answered {error}"),
        None => format!("`{line}` returned {} objects, record found: {found}", response.objects.len()),
    }
}

impl ScenarioRunner for SessionRunner<'_> {
    fn transport(&self) -> Transport {
        Transport::InteractiveSession
    }

    fn before(&mut self, scenario: &Scenario) -> Result<()> {
        stage_preconditions(self.context, scenario)
    }

    fn after(&mut self, scenario: &Scenario) -> Result<()> {
        verify_postconditions(self.context, scenario)
    }

    fn create(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    fn modify(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    fn delete(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    #[instrument(skip_all, fields(transport = "interactive_session"))]
    fn search(&mut self, scenario: &Scenario) -> Result<()> {
        let line = format!("-r -B {}", self.context.record().key);
        self.lookup(scenario, &line)
    }

    #[instrument(skip_all, fields(transport = "interactive_session"))]
    fn fetch(&mut self, scenario: &Scenario) -> Result<()> {
        let record = self.context.record();
        let line = format!("-r -B -T {} {}", record.object_type, record.key);
        self.lookup(scenario, &line)
    }

    #[instrument(skip_all, fields(transport = "interactive_session"))]
    fn metadata_fetch(&mut self, scenario: &Scenario) -> Result<()> {
        let object_type = self.context.record().object_type.to_ascii_lowercase();
        let line = format!("-t {object_type}");
        let response = self.query(&line)?;
        let describes_type = response.errors.is_empty()
            && response.objects.iter().any(|object| {
                object
                    .lines()
                    .find_map(attribute_name)
                    .is_some_and(|name| name == object_type)
            });
        expect_outcome(
            scenario,
            Outcome::from_success(describes_type),
            describe(&line, &response, describes_type),
        )?;
        Ok(())
    }

    fn event_notify(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }
}
