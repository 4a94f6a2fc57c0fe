//! The immutable scenario record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::builder::Given;
use crate::core::dimension::{Mode, Operation, Outcome, RecordState, RequestVariant, Transport};
use crate::error::ScenarioError;

/// One declarative test case: given a mode and pre-state, when an operation
/// is performed over a transport, then an outcome and post-state follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scenario {
    mode: Mode,
    pre_state: RecordState,
    transport: Transport,
    operation: Operation,
    request: RequestVariant,
    outcome: Outcome,
    post_state: RecordState,
}

impl Scenario {
    pub fn new(
        mode: Mode,
        pre_state: RecordState,
        transport: Transport,
        operation: Operation,
        request: RequestVariant,
        outcome: Outcome,
        post_state: RecordState,
    ) -> Self {
        Self {
            mode,
            pre_state,
            transport,
            operation,
            request,
            outcome,
            post_state,
        }
    }

    /// Start a staged builder; see [`crate::core::builder`].
    pub fn given(mode: Mode, pre_state: RecordState) -> Given {
        Given::new(mode, pre_state)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pre_state(&self) -> RecordState {
        self.pre_state
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn request(&self) -> RequestVariant {
        self.request
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn post_state(&self) -> RecordState {
        self.post_state
    }
}

impl fmt::Display for Scenario {
    // Two spaces between transport and operation are part of the format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GIVEN( {}, {} ) WHEN( {}  {}, {} ) THEN( {}, {} )",
            self.mode,
            self.pre_state,
            self.transport,
            self.operation,
            self.request,
            self.outcome,
            self.post_state
        )
    }
}

/// Untyped scenario input where any field may be missing.
///
/// Suite files and other loosely typed sources build one of these and
/// convert it with [`Scenario::try_from`], which refuses partial input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioParts {
    pub mode: Option<Mode>,
    pub pre_state: Option<RecordState>,
    pub transport: Option<Transport>,
    pub operation: Option<Operation>,
    pub request: Option<RequestVariant>,
    pub outcome: Option<Outcome>,
    pub post_state: Option<RecordState>,
}

impl From<Scenario> for ScenarioParts {
    fn from(scenario: Scenario) -> Self {
        Self {
            mode: Some(scenario.mode),
            pre_state: Some(scenario.pre_state),
            transport: Some(scenario.transport),
            operation: Some(scenario.operation),
            request: Some(scenario.request),
            outcome: Some(scenario.outcome),
            post_state: Some(scenario.post_state),
        }
    }
}

impl TryFrom<ScenarioParts> for Scenario {
    type Error = ScenarioError;

    fn try_from(parts: ScenarioParts) -> Result<Self, Self::Error> {
        Ok(Scenario::new(
            parts.mode.ok_or(ScenarioError::MissingField("mode"))?,
            parts.pre_state.ok_or(ScenarioError::MissingField("pre_state"))?,
            parts.transport.ok_or(ScenarioError::MissingField("transport"))?,
            parts.operation.ok_or(ScenarioError::MissingField("operation"))?,
            parts.request.ok_or(ScenarioError::MissingField("request"))?,
            parts.outcome.ok_or(ScenarioError::MissingField("outcome"))?,
            parts
                .post_state
                .ok_or(ScenarioError::MissingField("post_state"))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Scenario {
        Scenario::new(
            Mode::Old,
            RecordState::ExistsWithMarker,
            Transport::SyncBatch,
            Operation::Delete,
            RequestVariant::WithMarker,
            Outcome::Success,
            RecordState::Absent,
        )
    }

    #[test]
    fn accessors_return_supplied_values() {
        let scenario = complete();
        assert_eq!(scenario.mode(), Mode::Old);
        assert_eq!(scenario.pre_state(), RecordState::ExistsWithMarker);
        assert_eq!(scenario.transport(), Transport::SyncBatch);
        assert_eq!(scenario.operation(), Operation::Delete);
        assert_eq!(scenario.request(), RequestVariant::WithMarker);
        assert_eq!(scenario.outcome(), Outcome::Success);
        assert_eq!(scenario.post_state(), RecordState::Absent);
    }

    #[test]
    fn renders_canonical_string() {
        let scenario = Scenario::new(
            Mode::New,
            RecordState::ExistsWithoutMarker,
            Transport::WebApi,
            Operation::Create,
            RequestVariant::NotApplicable,
            Outcome::Success,
            RecordState::ExistsWithMarker,
        );
        assert_eq!(
            scenario.to_string(),
            "GIVEN( NEW_MODE, OBJ_EXISTS_NO_CHANGED__ ) WHEN( REST___  CREATE, NOT_APPLIC__ ) THEN( SUCCESS, OBJ_EXISTS_WITH_CHANGED )"
        );
    }

    #[test]
    fn complete_parts_convert() {
        let parts = ScenarioParts::from(complete());
        assert_eq!(Scenario::try_from(parts), Ok(complete()));
    }

    #[test]
    fn each_missing_field_is_rejected() {
        let full = ScenarioParts::from(complete());
        let cases: [(&'static str, fn(&mut ScenarioParts)); 7] = [
            ("mode", |p| p.mode = None),
            ("pre_state", |p| p.pre_state = None),
            ("transport", |p| p.transport = None),
            ("operation", |p| p.operation = None),
            ("request", |p| p.request = None),
            ("outcome", |p| p.outcome = None),
            ("post_state", |p| p.post_state = None),
        ];
        for (field, clear) in cases {
            let mut parts = full;
            clear(&mut parts);
            assert_eq!(
                Scenario::try_from(parts),
                Err(ScenarioError::MissingField(field)),
                "missing {field}"
            );
        }
    }
}
