//! Comparing observations against what a scenario declared.

use crate::core::dimension::{Outcome, RecordState};
use crate::core::scenario::Scenario;
use crate::error::{AssertionFailure, Check};

/// Fail unless the observed outcome is the declared one.
pub fn expect_outcome(
    scenario: &Scenario,
    observed: Outcome,
    detail: impl Into<String>,
) -> Result<(), AssertionFailure> {
    if observed == scenario.outcome() {
        return Ok(());
    }
    Err(AssertionFailure {
        scenario: scenario.to_string(),
        check: Check::Outcome,
        expected: scenario.outcome().to_string(),
        observed: observed.to_string(),
        detail: detail.into(),
    })
}

/// Fail unless the observed record state is the declared post-state.
pub fn expect_state(
    scenario: &Scenario,
    observed: RecordState,
    detail: impl Into<String>,
) -> Result<(), AssertionFailure> {
    if observed == scenario.post_state() {
        return Ok(());
    }
    Err(AssertionFailure {
        scenario: scenario.to_string(),
        check: Check::PostState,
        expected: scenario.post_state().to_string(),
        observed: observed.to_string(),
        detail: detail.into(),
    })
}
