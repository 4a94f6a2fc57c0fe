//! Transport to runner resolution.

use crate::context::ExecutionContext;
use crate::core::dimension::Transport;
use crate::runners::ScenarioRunner;
use crate::runners::batch::BatchRunner;
use crate::runners::mail::MailRunner;
use crate::runners::session::SessionRunner;
use crate::runners::stream::StreamRunner;
use crate::runners::web_api::WebApiRunner;

/// Resolves the runner for a transport, bound to a context.
pub trait RunnerProvider {
    fn resolve<'c>(
        &self,
        transport: Transport,
        context: &'c ExecutionContext,
    ) -> Box<dyn ScenarioRunner + 'c>;
}

/// Default provider: one runner type per transport, created fresh per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportRegistry;

impl RunnerProvider for TransportRegistry {
    fn resolve<'c>(
        &self,
        transport: Transport,
        context: &'c ExecutionContext,
    ) -> Box<dyn ScenarioRunner + 'c> {
        match transport {
            Transport::WebApi => Box::new(WebApiRunner::new(context)),
            Transport::InteractiveSession => Box::new(SessionRunner::new(context)),
            Transport::SyncBatch => Box::new(BatchRunner::new(context)),
            Transport::AsyncSubmission => Box::new(MailRunner::new(context)),
            Transport::ReplicationStream => Box::new(StreamRunner::new(context)),
        }
    }
}
