//! Everything a runner needs to talk to the record-management system.
//!
//! The context is assembled once by the harness and only read during runs.
//! It also carries the [`RunnerProvider`], so scenarios resolve their runner
//! through whatever the harness installed instead of a global table.

use std::time::{Duration, Instant};

use crate::core::content::{Charset, ContentWithCredentials, Credential};
use crate::core::record::TargetRecord;
use crate::io::batch::{BatchUpdateClient, HttpBatchUpdate};
use crate::io::config::EngineConfig;
use crate::io::fixture::{ApiFixture, ModeControl, RecordFixture};
use crate::io::mail::{CommandMailSubmitter, MailSubmitter};
use crate::io::session::{QuerySession, TcpQuerySession};
use crate::io::stream::{ReplicationStream, TcpReplicationStream};
use crate::io::web_api::{HttpWebApi, WebApiClient};
use crate::registry::{RunnerProvider, TransportRegistry};

/// One client per transport, plus the fixture.
pub struct Transports {
    pub web_api: Box<dyn WebApiClient>,
    pub session: Box<dyn QuerySession>,
    pub batch: Box<dyn BatchUpdateClient>,
    pub mail: Box<dyn MailSubmitter>,
    pub stream: Box<dyn ReplicationStream>,
    pub fixture: Box<dyn RecordFixture>,
}

/// Plain values shared by all runners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSettings {
    pub record: TargetRecord,
    /// Attached to every submission made by the transport under test.
    pub credentials: Vec<Credential>,
    pub charset: Charset,
    pub mail_from: String,
    pub mail_to: String,
    pub mail_subject: String,
    /// Upper bound for one runner operation.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ContextSettings {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            record: cfg.record.clone(),
            credentials: cfg.credentials.submit.clone(),
            charset: cfg.charset,
            mail_from: cfg.mail.from.clone(),
            mail_to: cfg.mail.to.clone(),
            mail_subject: cfg.mail.subject.clone(),
            timeout: cfg.operation_timeout(),
            poll_interval: cfg.poll_interval(),
        }
    }
}

/// Read-only execution context handed to [`Scenario::run`](crate::core::scenario::Scenario::run).
pub struct ExecutionContext {
    settings: ContextSettings,
    transports: Transports,
    provider: Box<dyn RunnerProvider>,
}

impl ExecutionContext {
    /// Context resolving runners through [`TransportRegistry`].
    pub fn new(settings: ContextSettings, transports: Transports) -> Self {
        Self {
            settings,
            transports,
            provider: Box::new(TransportRegistry),
        }
    }

    /// Replace the runner provider.
    pub fn with_provider(mut self, provider: Box<dyn RunnerProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Context with the real blocking clients described by `cfg`.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        let mode = if cfg.mode_switch.command.is_empty() {
            ModeControl::Fixed(cfg.mode)
        } else {
            ModeControl::Command {
                argv: cfg.mode_switch.command.clone(),
                output_limit_bytes: cfg.output_limit_bytes,
            }
        };
        let transports = Transports {
            web_api: Box::new(HttpWebApi::new(&cfg.web_api.base_url, &cfg.web_api.source)),
            session: Box::new(TcpQuerySession::new(
                &cfg.session.address,
                cfg.output_limit_bytes,
            )),
            batch: Box::new(HttpBatchUpdate::new(&cfg.batch.url)),
            mail: Box::new(CommandMailSubmitter::new(
                cfg.mail.command.clone(),
                &cfg.mail.ack_dir,
                cfg.output_limit_bytes,
            )),
            stream: Box::new(TcpReplicationStream::new(
                TcpQuerySession::new(&cfg.stream.address, cfg.output_limit_bytes),
                &cfg.stream.source,
            )),
            fixture: Box::new(ApiFixture::new(
                Box::new(HttpWebApi::new(&cfg.web_api.base_url, &cfg.web_api.source)),
                cfg.credentials.fixture.clone(),
                cfg.charset,
                mode,
            )),
        };
        Self::new(ContextSettings::from_config(cfg), transports)
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn record(&self) -> &TargetRecord {
        &self.settings.record
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval
    }

    /// Deadline for an operation starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.settings.timeout
    }

    /// `text` bundled with the submission credentials and charset.
    pub fn submission(&self, text: impl Into<String>) -> ContentWithCredentials {
        ContentWithCredentials::with_credentials_and_charset(
            text,
            self.settings.credentials.clone(),
            self.settings.charset,
        )
    }

    pub fn web_api(&self) -> &dyn WebApiClient {
        self.transports.web_api.as_ref()
    }

    pub fn session(&self) -> &dyn QuerySession {
        self.transports.session.as_ref()
    }

    pub fn batch(&self) -> &dyn BatchUpdateClient {
        self.transports.batch.as_ref()
    }

    pub fn mail(&self) -> &dyn MailSubmitter {
        self.transports.mail.as_ref()
    }

    pub fn stream(&self) -> &dyn ReplicationStream {
        self.transports.stream.as_ref()
    }

    pub fn fixture(&self) -> &dyn RecordFixture {
        self.transports.fixture.as_ref()
    }

    pub fn provider(&self) -> &dyn RunnerProvider {
        self.provider.as_ref()
    }
}
