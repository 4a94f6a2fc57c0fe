//! Declarative conformance scenarios for a record-management system reached
//! over several transports.
//!
//! A [`Scenario`] declares mode, pre-state, transport, operation, request
//! variant, expected outcome and expected post-state. [`Scenario::run`]
//! resolves the runner for the transport through the [`ExecutionContext`],
//! stages the pre-state, performs exactly one operation and checks what it
//! observed against the declaration.
//!
//! - **[`core`]**: dimensions, scenarios, the builder, record shaping and reply
//!   parsing. Pure and deterministic.
//! - **[`io`]**: transport clients, the record fixture, configuration. Each
//!   client sits behind a trait.
//! - **[`runners`]**: one execution strategy per transport.

pub mod context;
pub mod core;
mod dispatch;
pub mod error;
pub mod io;
pub mod logging;
pub mod registry;
pub mod runners;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::context::{ContextSettings, ExecutionContext, Transports};
pub use crate::core::builder::given;
pub use crate::core::content::{Charset, ContentWithCredentials, Credential};
pub use crate::core::dimension::{Mode, Operation, Outcome, RecordState, RequestVariant, Transport};
pub use crate::core::record::TargetRecord;
pub use crate::core::scenario::{Scenario, ScenarioParts};
pub use crate::error::{AssertionFailure, Check, ScenarioError};
pub use crate::registry::{RunnerProvider, TransportRegistry};
pub use crate::runners::ScenarioRunner;
