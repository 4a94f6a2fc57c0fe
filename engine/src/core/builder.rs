//! Staged scenario builder.
//!
//! `given(..).when(..).then(..)` reads like the scenario string. Each stage is
//! a separate type, so an incomplete scenario does not compile.

use crate::core::dimension::{Mode, Operation, Outcome, RecordState, RequestVariant, Transport};
use crate::core::scenario::Scenario;

/// Start building a scenario from its preconditions.
pub fn given(mode: Mode, pre_state: RecordState) -> Given {
    Given::new(mode, pre_state)
}

/// First stage: mode and pre-state are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Given {
    mode: Mode,
    pre_state: RecordState,
}

impl Given {
    pub fn new(mode: Mode, pre_state: RecordState) -> Self {
        Self { mode, pre_state }
    }

    /// Set the action; the request variant defaults to not-applicable.
    pub fn when(self, transport: Transport, operation: Operation) -> When {
        self.when_with(transport, operation, RequestVariant::NotApplicable)
    }

    pub fn when_with(
        self,
        transport: Transport,
        operation: Operation,
        request: RequestVariant,
    ) -> When {
        When {
            given: self,
            transport,
            operation,
            request,
        }
    }
}

/// Second stage: the action is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct When {
    given: Given,
    transport: Transport,
    operation: Operation,
    request: RequestVariant,
}

impl When {
    /// Finish with the record left as it was before the operation.
    pub fn then(self, outcome: Outcome) -> Scenario {
        self.then_with(outcome, self.given.pre_state)
    }

    /// Finish with an explicit post-state.
    pub fn then_with(self, outcome: Outcome, post_state: RecordState) -> Scenario {
        Scenario::new(
            self.given.mode,
            self.given.pre_state,
            self.transport,
            self.operation,
            self.request,
            outcome,
            post_state,
        )
    }
}
