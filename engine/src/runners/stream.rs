//! Replication stream runner.
//!
//! The stream is read-only, so the only observable operation is the event
//! emitted when the record was staged. `before` first stages the opposite of
//! the pre-state, so staging the pre-state itself always emits an event no
//! matter what earlier scenarios left behind. It remembers the serial on both
//! sides of that last step; `event_notify` waits for an event for the record
//! past the first serial and checks that the latest one announces the record.

use std::time::Instant;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::core::budget::remaining_budget;
use crate::core::dimension::{Outcome, RecordState, Transport};
use crate::core::response::{EventKind, latest_event_for};
use crate::core::scenario::Scenario;
use crate::core::verdict::expect_outcome;
use crate::io::poll::poll_until;
use crate::runners::{
    ScenarioRunner, enter_staging_mode, leave_staging_mode, unsupported, verify_postconditions,
};

/// Serials read around staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StagingWindow {
    before: u64,
    after: u64,
}

pub struct StreamRunner<'c> {
    context: &'c ExecutionContext,
    window: Option<StagingWindow>,
}

impl<'c> StreamRunner<'c> {
    pub fn new(context: &'c ExecutionContext) -> Self {
        Self {
            context,
            window: None,
        }
    }
}

impl ScenarioRunner for StreamRunner<'_> {
    fn transport(&self) -> Transport {
        Transport::ReplicationStream
    }

    fn before(&mut self, scenario: &Scenario) -> Result<()> {
        let deadline = self.context.deadline();
        let fixture = self.context.fixture();
        let record = self.context.record();
        let stream = self.context.stream();

        let staging = enter_staging_mode(self.context, scenario, deadline)?;
        fixture.stage(record, opposite(scenario.pre_state()), remaining_budget(deadline)?)?;
        let before = stream.current_serial(remaining_budget(deadline)?)?;
        fixture.stage(record, scenario.pre_state(), remaining_budget(deadline)?)?;
        let after = stream.current_serial(remaining_budget(deadline)?)?;
        leave_staging_mode(self.context, scenario, staging, deadline)?;
        debug!(before, after, "staging window");
        self.window = Some(StagingWindow { before, after });
        Ok(())
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

    fn search(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    fn fetch(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    fn metadata_fetch(&mut self, scenario: &Scenario) -> Result<()> {
        unsupported(scenario)
    }

    #[instrument(skip_all, fields(transport = "replication_stream"))]
    fn event_notify(&mut self, scenario: &Scenario) -> Result<()> {
        let window = self
            .window
            .ok_or_else(|| anyhow!("event_notify called before the staging window was read"))?;
        if window.after <= window.before {
            expect_outcome(
                scenario,
                Outcome::Failure,
                format!("staging emitted no event past serial {}", window.before),
            )?;
            return Ok(());
        }

        let record = self.context.record();
        let stream = self.context.stream();
        let deadline = self.context.deadline();
        let interval = self.context.poll_interval();
        let events = poll_until(deadline, interval, || {
            let budget = deadline.saturating_duration_since(Instant::now()).max(interval);
            let events = stream.events_since(window.before + 1, budget)?;
            Ok(latest_event_for(&events, record).is_some().then_some(events))
        })?
        .unwrap_or_default();

        let latest = latest_event_for(&events, record);
        let announced = latest.is_some_and(|event| event.kind == EventKind::Add);
        let detail = match latest {
            Some(event) => format!("latest event {:?} at serial {}", event.kind, event.serial),
            None => format!("no event for {} past serial {}", record.key, window.before),
        };
        expect_outcome(scenario, Outcome::from_success(announced), detail)?;
        Ok(())
    }
}

/// A state whose staging is undone by staging `state`.
fn opposite(state: RecordState) -> RecordState {
    if state.exists() {
        RecordState::Absent
    } else {
        RecordState::ExistsWithoutMarker
    }
}
