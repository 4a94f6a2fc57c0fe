//! Per-transport execution strategies.
//!
//! Every runner implements the same [`ScenarioRunner`] contract: `before`
//! stages the declared pre-state and mode, one operation method performs the
//! transport call and checks the declared outcome, and `after` checks the
//! declared post-state. Operations a transport does not offer are observed as
//! [`Outcome::Failure`].

pub mod batch;
pub mod mail;
pub mod session;
pub mod stream;
pub mod web_api;

use std::time::Instant;

use anyhow::Result;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::core::budget::remaining_budget;
use crate::core::dimension::{Mode, Operation, Outcome, Transport};
use crate::core::scenario::Scenario;
use crate::core::verdict::{expect_outcome, expect_state};

/// Execution strategy for one transport.
pub trait ScenarioRunner {
    fn transport(&self) -> Transport;

    fn before(&mut self, scenario: &Scenario) -> Result<()>;
    fn after(&mut self, scenario: &Scenario) -> Result<()>;

    fn create(&mut self, scenario: &Scenario) -> Result<()>;
    fn modify(&mut self, scenario: &Scenario) -> Result<()>;
    fn delete(&mut self, scenario: &Scenario) -> Result<()>;
    fn search(&mut self, scenario: &Scenario) -> Result<()>;
    fn fetch(&mut self, scenario: &Scenario) -> Result<()>;
    fn metadata_fetch(&mut self, scenario: &Scenario) -> Result<()>;
    fn event_notify(&mut self, scenario: &Scenario) -> Result<()>;
}

/// Put the record into its pre-state and the backend into the scenario's mode.
pub(crate) fn stage_preconditions(context: &ExecutionContext, scenario: &Scenario) -> Result<()> {
    let deadline = context.deadline();
    let staging = enter_staging_mode(context, scenario, deadline)?;
    context
        .fixture()
        .stage(context.record(), scenario.pre_state(), remaining_budget(deadline)?)?;
    leave_staging_mode(context, scenario, staging, deadline)?;
    debug!(pre_state = %scenario.pre_state(), "preconditions staged");
    Ok(())
}

/// Switch the backend to the fixture's staging mode for `scenario`.
pub(crate) fn enter_staging_mode(
    context: &ExecutionContext,
    scenario: &Scenario,
    deadline: Instant,
) -> Result<Mode> {
    let fixture = context.fixture();
    let staging = fixture.staging_mode(scenario.mode());
    fixture.apply_mode(staging, remaining_budget(deadline)?)?;
    Ok(staging)
}

/// Switch from `staging` to the scenario's declared mode, if they differ.
pub(crate) fn leave_staging_mode(
    context: &ExecutionContext,
    scenario: &Scenario,
    staging: Mode,
    deadline: Instant,
) -> Result<()> {
    if staging != scenario.mode() {
        context
            .fixture()
            .apply_mode(scenario.mode(), remaining_budget(deadline)?)?;
    }
    Ok(())
}

/// Read the record back and compare it with the declared post-state.
pub(crate) fn verify_postconditions(context: &ExecutionContext, scenario: &Scenario) -> Result<()> {
    let observed = context
        .fixture()
        .observe(context.record(), context.timeout())?;
    expect_state(scenario, observed, "fixture lookup after the operation")?;
    Ok(())
}

/// An operation the transport has no way to perform.
pub(crate) fn unsupported(scenario: &Scenario) -> Result<()> {
    debug!(
        transport = scenario.transport().name(),
        operation = scenario.operation().name(),
        "operation not offered by transport"
    );
    expect_outcome(
        scenario,
        Outcome::Failure,
        format!(
            "{} does not offer {}",
            scenario.transport().name(),
            scenario.operation().name()
        ),
    )?;
    Ok(())
}

/// Text submitted by update-style transports (batch, mail) for a mutation.
///
/// The object is rendered per the request variant; a delete repeats the
/// stored object followed by a `delete:` line.
pub(crate) fn update_text(context: &ExecutionContext, scenario: &Scenario) -> String {
    let record = context.record();
    let mut text = record.payload(scenario.request(), scenario.pre_state());
    if scenario.operation() == Operation::Delete {
        text.push_str("delete: conformance test\n");
    }
    text
}
