//! Error kinds raised by the scenario engine.
//!
//! Orchestration code returns `anyhow::Result`; these typed errors travel
//! inside it so callers can tell a failed expectation apart from a broken
//! environment with `downcast_ref`.

use std::fmt;

use thiserror::Error;

/// Invalid scenario input, detected before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("scenario field `{0}` is required")]
    MissingField(&'static str),

    #[error("unknown {dimension} `{value}`")]
    UnknownValue {
        dimension: &'static str,
        value: String,
    },
}

/// What a failed assertion was checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Outcome,
    PostState,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Outcome => f.write_str("outcome"),
            Check::PostState => f.write_str("post-state"),
        }
    }
}

/// Observed behaviour diverged from what the scenario declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{scenario}: {check} expected {expected}, observed {observed} ({detail})")]
pub struct AssertionFailure {
    /// Canonical string of the failing scenario.
    pub scenario: String,
    pub check: Check,
    pub expected: String,
    pub observed: String,
    pub detail: String,
}
