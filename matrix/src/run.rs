use std::time::Instant;

use engine::{AssertionFailure, ExecutionContext, Scenario, Transport};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Observed outcome and post-state matched the declaration.
    Pass,
    /// The system behaved differently than declared.
    Fail,
    /// The environment got in the way; nothing was learned about the system.
    Error,
}

/// Classify a scenario run by what its error carries.
pub fn classify(result: &anyhow::Result<()>) -> Verdict {
    match result {
        Ok(()) => Verdict::Pass,
        Err(err) if err.downcast_ref::<AssertionFailure>().is_some() => Verdict::Fail,
        Err(_) => Verdict::Error,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioResult {
    pub scenario: String,
    pub transport: Transport,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_millis: u64,
}

/// Run scenarios in order. With `fail_fast`, stop after the first result
/// that is not a pass.
pub fn run_scenarios(
    scenarios: &[Scenario],
    context: &ExecutionContext,
    fail_fast: bool,
) -> Vec<ScenarioResult> {
    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let started = Instant::now();
        let result = scenario.run(context);
        let verdict = classify(&result);
        let duration_millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        results.push(ScenarioResult {
            scenario: scenario.to_string(),
            transport: scenario.transport(),
            verdict,
            message: result.err().map(|err| format!("{err:#}")),
            duration_millis,
        });
        if fail_fast && verdict != Verdict::Pass {
            info!(remaining = scenarios.len() - results.len(), "fail-fast stop");
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::test_support::InMemoryBackend;
    use engine::{Mode, Operation, Outcome, RecordState, given};

    fn passing() -> Scenario {
        given(Mode::Old, RecordState::ExistsWithMarker)
            .when(Transport::WebApi, Operation::Fetch)
            .then(Outcome::Success)
    }

    fn failing() -> Scenario {
        given(Mode::Old, RecordState::ExistsWithMarker)
            .when(Transport::WebApi, Operation::Fetch)
            .then(Outcome::Failure)
    }

    #[test]
    fn classifies_errors_by_kind() {
        assert_eq!(classify(&Ok(())), Verdict::Pass);
        assert_eq!(classify(&Err(anyhow::anyhow!("refused"))), Verdict::Error);
        let failure = AssertionFailure {
            scenario: "s".to_string(),
            check: engine::Check::Outcome,
            expected: "SUCCESS".to_string(),
            observed: "FAILED".to_string(),
            detail: "d".to_string(),
        };
        assert_eq!(classify(&Err(failure.into())), Verdict::Fail);
    }

    #[test]
    fn runs_every_scenario_by_default() {
        let backend = InMemoryBackend::new();
        let context = backend.context();
        let results = run_scenarios(&[failing(), passing()], &context, false);
        let verdicts: Vec<Verdict> = results.iter().map(|r| r.verdict).collect();
        assert_eq!(verdicts, vec![Verdict::Fail, Verdict::Pass]);
        assert!(results[0].message.is_some());
        assert_eq!(results[1].message, None);
        assert_eq!(results[1].scenario, passing().to_string());
    }

    #[test]
    fn fail_fast_stops_at_first_non_pass() {
        let backend = InMemoryBackend::new();
        let context = backend.context();
        let results = run_scenarios(&[passing(), failing(), passing()], &context, true);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].verdict, Verdict::Fail);
    }

    #[test]
    fn broken_transport_is_an_error_verdict() {
        let backend = InMemoryBackend::new();
        backend.break_transport(Transport::WebApi);
        let context = backend.context();
        let results = run_scenarios(&[passing()], &context, false);
        assert_eq!(results[0].verdict, Verdict::Error);
        assert_eq!(results[0].message.as_deref(), Some("web_api unavailable"));
    }
}
