//! Staging and observing the target record outside the transport under test.
//!
//! Runners use the fixture in `before` to put the backend into the declared
//! mode and pre-state, and in `after` to read back the post-state. The real
//! fixture goes through the web API with administrative override credentials
//! so ownership checks never get in the way of staging.
//!
//! A backend in new mode drops the history marker from every write, the
//! fixture's included. Records are therefore staged in the fixture's staging
//! mode (old mode whenever the fixture can switch) and the declared mode is
//! applied afterwards.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use crate::core::budget::remaining_budget;
use crate::core::content::{Charset, ContentWithCredentials, Credential};
use crate::core::dimension::{Mode, RecordState};
use crate::core::record::TargetRecord;
use crate::io::process::{command_from_argv, run_command_with_timeout};
use crate::io::web_api::{ApiRequest, WebApiClient};

/// Abstraction over record fixtures.
pub trait RecordFixture {
    /// Make sure the backend runs in `mode`.
    fn apply_mode(&self, mode: Mode, timeout: Duration) -> Result<()>;

    /// Mode to stage records in when a scenario runs in `scenario_mode`.
    fn staging_mode(&self, scenario_mode: Mode) -> Mode;

    /// Bring the record into `state`. Fails if the backend refuses.
    fn stage(&self, record: &TargetRecord, state: RecordState, timeout: Duration) -> Result<()>;

    /// Current state of the record, read without output filtering.
    fn observe(&self, record: &TargetRecord, timeout: Duration) -> Result<RecordState>;
}

/// How the fixture gets the backend into a mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeControl {
    /// The backend is started in one mode; scenarios for the other mode error.
    Fixed(Mode),
    /// Run a command; `{mode}` in any argument is replaced by the mode name.
    Command {
        argv: Vec<String>,
        output_limit_bytes: usize,
    },
}

/// Fixture backed by the web API.
pub struct ApiFixture {
    api: Box<dyn WebApiClient>,
    credentials: Vec<Credential>,
    charset: Charset,
    mode: ModeControl,
}

impl ApiFixture {
    pub fn new(
        api: Box<dyn WebApiClient>,
        credentials: Vec<Credential>,
        charset: Charset,
        mode: ModeControl,
    ) -> Self {
        Self {
            api,
            credentials,
            charset,
            mode,
        }
    }

    fn delete(&self, record: &TargetRecord, timeout: Duration) -> Result<()> {
        let response = self.api.send(
            &ApiRequest::Delete {
                object_type: &record.object_type,
                key: &record.key,
                credentials: &self.credentials,
            },
            timeout,
        )?;
        if !response.is_success() {
            bail!(
                "delete {} {} refused with status {}: {}",
                record.object_type,
                record.key,
                response.status,
                response.body.trim()
            );
        }
        Ok(())
    }

    fn write(
        &self,
        record: &TargetRecord,
        with_marker: bool,
        exists: bool,
        timeout: Duration,
    ) -> Result<()> {
        let payload = ContentWithCredentials::with_credentials_and_charset(
            record.render(with_marker),
            self.credentials.clone(),
            self.charset,
        );
        let request = if exists {
            ApiRequest::Update {
                object_type: &record.object_type,
                key: &record.key,
                payload: &payload,
            }
        } else {
            ApiRequest::Create {
                object_type: &record.object_type,
                payload: &payload,
            }
        };
        let response = self.api.send(&request, timeout)?;
        if !response.is_success() {
            bail!(
                "{} {} {} refused with status {}: {}",
                request.method(),
                record.object_type,
                record.key,
                response.status,
                response.body.trim()
            );
        }
        Ok(())
    }
}

impl RecordFixture for ApiFixture {
    fn apply_mode(&self, mode: Mode, timeout: Duration) -> Result<()> {
        match &self.mode {
            ModeControl::Fixed(current) if *current == mode => Ok(()),
            ModeControl::Fixed(current) => {
                bail!("backend runs in {current} and cannot switch to {mode}")
            }
            ModeControl::Command {
                argv,
                output_limit_bytes,
            } => {
                let argv: Vec<String> = argv
                    .iter()
                    .map(|arg| arg.replace("{mode}", mode.name()))
                    .collect();
                let cmd = command_from_argv(&argv)?;
                let output = run_command_with_timeout(cmd, None, timeout, *output_limit_bytes)
                    .with_context(|| format!("run mode switch {argv:?}"))?;
                if !output.succeeded() {
                    bail!(
                        "mode switch to {mode} failed (exit {:?}, timed out: {}): {}",
                        output.status.code(),
                        output.timed_out,
                        output.stderr_text()
                    );
                }
                info!(mode = mode.name(), "mode switched");
                Ok(())
            }
        }
    }

    fn staging_mode(&self, scenario_mode: Mode) -> Mode {
        match self.mode {
            ModeControl::Fixed(_) => scenario_mode,
            ModeControl::Command { .. } => Mode::Old,
        }
    }

    #[instrument(skip_all, fields(key = %record.key, state = %state))]
    fn stage(&self, record: &TargetRecord, state: RecordState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let current = self.observe(record, remaining_budget(deadline)?)?;
        if current == state {
            debug!("record already staged");
            return Ok(());
        }
        match state {
            RecordState::Absent => self.delete(record, remaining_budget(deadline)?)?,
            RecordState::ExistsWithMarker | RecordState::ExistsWithoutMarker => self.write(
                record,
                state.has_marker(),
                current.exists(),
                remaining_budget(deadline)?,
            )?,
        }
        let staged = self.observe(record, remaining_budget(deadline)?)?;
        if staged != state {
            bail!("could not stage {state}: backend holds {staged}");
        }
        debug!("record staged");
        Ok(())
    }

    fn observe(&self, record: &TargetRecord, timeout: Duration) -> Result<RecordState> {
        let response = self.api.send(
            &ApiRequest::Lookup {
                object_type: &record.object_type,
                key: &record.key,
                unfiltered: true,
            },
            timeout,
        )?;
        match response.status {
            404 => Ok(RecordState::Absent),
            status if (200..300).contains(&status) => Ok(record.state_of(Some(&response.body))),
            status => bail!(
                "lookup {} {} returned status {status}: {}",
                record.object_type,
                record.key,
                response.body.trim()
            ),
        }
    }
}
