//! Web API runner: structured requests, outcome read from the status code.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::core::dimension::{Outcome, Transport};
use crate::core::response::parse_query_response;
use crate::core::scenario::Scenario;
use crate::core::verdict::expect_outcome;
use crate::io::web_api::{ApiRequest, ApiResponse};
use crate::runners::{ScenarioRunner, stage_preconditions, unsupported, verify_postconditions};

pub struct WebApiRunner<'c> {
    context: &'c ExecutionContext,
}

impl<'c> WebApiRunner<'c> {
    pub fn new(context: &'c ExecutionContext) -> Self {
        Self { context }
    }

    fn send(&self, request: &ApiRequest<'_>) -> Result<ApiResponse> {
        let response = self
            .context
            .web_api()
            .send(request, self.context.timeout())?;
        debug!(
            method = request.method(),
            status = response.status,
            "web api replied"
        );
        Ok(response)
    }

    /// Submit the record shaped by the request variant as a create or update.
    fn submit(&self, scenario: &Scenario, update: bool) -> Result<()> {
        let record = self.context.record();
        let payload = self
            .context
            .submission(record.payload(scenario.request(), scenario.pre_state()));
        let request = if update {
            ApiRequest::Update {
                object_type: &record.object_type,
                key: &record.key,
                payload: &payload,
            }
        } else {
            ApiRequest::Create {
                object_type: &record.object_type,
                payload: &payload,
            }
        };
        let response = self.send(&request)?;
        check_status(scenario, &response)
    }

    /// Read requests succeed when the reply is 2xx and names the record.
    fn read(&self, scenario: &Scenario, request: &ApiRequest<'_>) -> Result<()> {
        let response = self.send(request)?;
        let found = response.is_success()
            && parse_query_response(&response.body)
                .find(self.context.record())
                .is_some();
        expect_outcome(
            scenario,
            Outcome::from_success(found),
            format!("status {}, record found: {found}", response.status),
        )?;
        Ok(())
    }
}

fn check_status(scenario: &Scenario, response: &ApiResponse) -> Result<()> {
    expect_outcome(
        scenario,
        Outcome::from_success(response.is_success()),
        format!("status {}: {}", response.status, first_line(&response.body)),
    )?;
    Ok(())
}

fn first_line(body: &str) -> &str {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

impl ScenarioRunner for WebApiRunner<'_> {
    fn transport(&self) -> Transport {
        Transport::WebApi
    }

    fn before(&mut self, scenario: &Scenario) -> Result<()> {
        stage_preconditions(self.context, scenario)
    }

    fn after(&mut self, scenario: &Scenario) -> Result<()> {
        verify_postconditions(self.context, scenario)
    }

    #[instrument(skip_all, fields(transport = "web_api"))]
    fn create(&mut self, scenario: &Scenario) -> Result<()> {
        self.submit(scenario, false)
    }

    #[instrument(skip_all, fields(transport = "web_api"))]
    fn modify(&mut self, scenario: &Scenario) -> Result<()> {
        self.submit(scenario, true)
    }

    #[instrument(skip_all, fields(transport = "web_api"))]
    fn delete(&mut self, scenario: &Scenario) -> Result<()> {
        let record = self.context.record();
        let response = self.send(&ApiRequest::Delete {
            object_type: &record.object_type,
            key: &record.key,
            credentials: &self.context.settings().credentials,
        })?;
        check_status(scenario, &response)
    }

    #[instrument(skip_all, fields(transport = "web_api"))]
    fn search(&mut self, scenario: &Scenario) -> Result<()> {
        let key = self.context.record().key.clone();
        self.read(scenario, &ApiRequest::Search { query: &key })
    }

    #[instrument(skip_all, fields(transport = "web_api"))]
    fn fetch(&mut self, scenario: &Scenario) -> Result<()> {
        let record = self.context.record();
        self.read(
            scenario,
            &ApiRequest::Lookup {
                object_type: &record.object_type,
                key: &record.key,
                unfiltered: false,
            },
        )
    }

    #[instrument(skip_all, fields(transport = "web_api"))]
    fn metadata_fetch(&mut self, scenario: &Scenario) -> Result<()> {
        let object_type = &self.context.record().object_type;
        let response = self.send(&ApiRequest::Metadata { object_type })?;
        let describes_type = response.is_success() && response.body.contains(object_type.as_str());
        expect_outcome(
            scenario,
            Outcome::from_success(describes_type),
            format!("status {}, template for {object_type}: {describes_type}", response.status),
        )?;
        Ok(())
    }

    fn event_notify(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }
}
