//! Test doubles: an in-memory backend behind every client seam, a recording
//! runner provider, and one-shot socket servers for client tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::context::{ContextSettings, ExecutionContext, Transports};
use crate::core::content::{Charset, ContentWithCredentials, Credential};
use crate::core::dimension::{Mode, RecordState, Transport};
use crate::core::record::{TargetRecord, attribute_name};
use crate::core::response::{EventKind, StreamEvent};
use crate::core::scenario::Scenario;
use crate::io::batch::{BatchReply, BatchUpdateClient};
use crate::io::fixture::RecordFixture;
use crate::io::mail::{MailMessage, MailSubmitter};
use crate::io::session::QuerySession;
use crate::io::stream::ReplicationStream;
use crate::io::web_api::{ApiRequest, ApiResponse, WebApiClient};
use crate::registry::RunnerProvider;
use crate::runners::ScenarioRunner;

/// Password the in-memory backend accepts for ordinary submissions.
pub const SUBMIT_PASSWORD: &str = "conformance";
/// Password the in-memory backend accepts inside an override credential.
pub const OVERRIDE_PASSWORD: &str = "override";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Create,
    Modify,
    Delete,
}

impl Mutation {
    fn label(self) -> &'static str {
        match self {
            Mutation::Create => "Create",
            Mutation::Modify => "Modify",
            Mutation::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Applied {
    Done,
    Unchanged,
    Rejected { status: u16, reason: String },
}

#[derive(Debug)]
struct BackendState {
    mode: Mode,
    record: TargetRecord,
    stored: Option<String>,
    serial: u64,
    events: Vec<StreamEvent>,
    acks: BTreeMap<String, String>,
    ack_delay_polls: u32,
    broken: HashSet<Transport>,
    calls: Vec<String>,
}

/// Single-record backend with old/new mode behaviour.
///
/// In old mode submitted objects are stored as sent. In new mode the history
/// marker is dropped from every accepted object, fixture writes included, so
/// a pre-state carrying the marker can only be staged in old mode.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    state: Rc<RefCell<BackendState>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_record(TargetRecord::default())
    }

    pub fn with_record(record: TargetRecord) -> Self {
        Self {
            state: Rc::new(RefCell::new(BackendState {
                mode: Mode::Old,
                record,
                stored: None,
                serial: 0,
                events: Vec::new(),
                acks: BTreeMap::new(),
                ack_delay_polls: 0,
                broken: HashSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Settings matching this backend, with short time limits.
    pub fn settings(&self) -> ContextSettings {
        ContextSettings {
            record: self.state.borrow().record.clone(),
            credentials: vec![Credential::password(SUBMIT_PASSWORD)],
            charset: Charset::Latin1,
            mail_from: "tester@example.net".to_string(),
            mail_to: "auto-dbm@example.net".to_string(),
            mail_subject: "update".to_string(),
            timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(1),
        }
    }

    /// Context whose every client and fixture is this backend.
    pub fn context(&self) -> ExecutionContext {
        self.context_with(self.settings())
    }

    pub fn context_with(&self, settings: ContextSettings) -> ExecutionContext {
        ExecutionContext::new(
            settings,
            Transports {
                web_api: Box::new(self.clone()),
                session: Box::new(self.clone()),
                batch: Box::new(self.clone()),
                mail: Box::new(self.clone()),
                stream: Box::new(self.clone()),
                fixture: Box::new(self.clone()),
            },
        )
    }

    pub fn mode(&self) -> Mode {
        self.state.borrow().mode
    }

    pub fn stored(&self) -> Option<String> {
        self.state.borrow().stored.clone()
    }

    pub fn record_state(&self) -> RecordState {
        let state = self.state.borrow();
        state.record.state_of(state.stored.as_deref())
    }

    pub fn serial(&self) -> u64 {
        self.state.borrow().serial
    }

    /// Every client call, oldest first (e.g. `web_api PUT`, `session -t person`).
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Mail acknowledgements stay invisible for the next `polls` lookups.
    pub fn delay_acknowledgements(&self, polls: u32) {
        self.state.borrow_mut().ack_delay_polls = polls;
    }

    /// Mail is accepted but never acknowledged.
    pub fn drop_acknowledgements(&self) {
        self.state.borrow_mut().ack_delay_polls = u32::MAX;
    }

    /// Calls through `transport` fail as if the service were down.
    pub fn break_transport(&self, transport: Transport) {
        self.state.borrow_mut().broken.insert(transport);
    }

    fn enter(&self, transport: Transport, call: String) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.broken.contains(&transport) {
            bail!("{} unavailable", transport.name());
        }
        Ok(())
    }

    fn template(&self, object_type: &str) -> Option<String> {
        let state = self.state.borrow();
        if !object_type.eq_ignore_ascii_case(&state.record.object_type) {
            return None;
        }
        let mut names: Vec<String> = state.record.body.lines().filter_map(attribute_name).collect();
        if state.mode == Mode::Old {
            names.push(state.record.marker_attribute.to_ascii_lowercase());
        }
        let mut text = String::new();
        for name in names {
            text.push_str(&format!("{name}: [optional] [multiple]\n"));
        }
        Some(text)
    }

    fn lookup_text(&self, key: &str) -> Option<String> {
        let state = self.state.borrow();
        if !key.eq_ignore_ascii_case(&state.record.key) {
            return None;
        }
        state.stored.clone()
    }

    fn apply(&self, mutation: Mutation, text: &str, credentials: &[Credential]) -> Applied {
        let mut state = self.state.borrow_mut();
        if !state.record.matches(text) {
            return Applied::Rejected {
                status: 400,
                reason: "object does not match target record".to_string(),
            };
        }
        if !authorised(credentials) {
            return Applied::Rejected {
                status: 401,
                reason: "authorisation failed".to_string(),
            };
        }
        let accepted = match state.mode {
            Mode::Old => normalise(text),
            Mode::New => state.record.strip_marker(&normalise(text)),
        };
        match (mutation, state.stored.clone()) {
            (Mutation::Create, None) => {
                state.emit(EventKind::Add, accepted.clone());
                state.stored = Some(accepted);
                Applied::Done
            }
            (Mutation::Create, Some(_)) => Applied::Rejected {
                status: 409,
                reason: "object already exists".to_string(),
            },
            (Mutation::Modify, Some(current)) if current == accepted => Applied::Unchanged,
            (Mutation::Modify, Some(_)) => {
                state.emit(EventKind::Add, accepted.clone());
                state.stored = Some(accepted);
                Applied::Done
            }
            (Mutation::Delete, Some(current)) => {
                state.emit(EventKind::Del, current);
                state.stored = None;
                Applied::Done
            }
            (Mutation::Modify | Mutation::Delete, None) => Applied::Rejected {
                status: 404,
                reason: "object does not exist".to_string(),
            },
        }
    }

    /// Update-style submission: `delete:` marks a delete, otherwise the
    /// object is created or modified depending on what is stored.
    fn submit_update(&self, content: &ContentWithCredentials) -> String {
        let (object, delete) = split_delete(content.content());
        let mutation = if delete {
            Mutation::Delete
        } else if self.state.borrow().stored.is_some() {
            Mutation::Modify
        } else {
            Mutation::Create
        };
        let applied = self.apply(mutation, &object, content.credentials());
        let state = self.state.borrow();
        let subject = format!("[{}] {}", state.record.object_type, state.record.key);
        match applied {
            Applied::Done => format!("{} SUCCEEDED: {subject}\n", mutation.label()),
            Applied::Unchanged => format!("No operation: {subject}\n"),
            Applied::Rejected { reason, .. } => {
                format!("{} FAILED: {subject}\n***Error: {reason}\n", mutation.label())
            }
        }
    }
}

impl BackendState {
    fn emit(&mut self, kind: EventKind, object: String) {
        self.serial += 1;
        self.events.push(StreamEvent {
            serial: self.serial,
            kind,
            object,
        });
    }
}

fn authorised(credentials: &[Credential]) -> bool {
    credentials.iter().any(|credential| match credential {
        Credential::Password { password } => password == SUBMIT_PASSWORD,
        Credential::Override { password, .. } => password == OVERRIDE_PASSWORD,
    })
}

fn normalise(text: &str) -> String {
    let mut out: String = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

fn split_delete(text: &str) -> (String, bool) {
    let mut delete = false;
    let mut object = String::new();
    for line in text.lines() {
        if attribute_name(line).is_some_and(|name| name == "delete") {
            delete = true;
            continue;
        }
        object.push_str(line);
        object.push('\n');
    }
    (object, delete)
}

fn reply(status: u16, body: impl Into<String>) -> ApiResponse {
    ApiResponse {
        status,
        body: body.into(),
    }
}

const NOT_FOUND: &str = "%ERROR:101: no entries found\n";

impl WebApiClient for InMemoryBackend {
    fn send(&self, request: &ApiRequest<'_>, _timeout: Duration) -> Result<ApiResponse> {
        self.enter(Transport::WebApi, format!("web_api {}", request.method()))?;
        let response = match request {
            ApiRequest::Create { payload, .. } | ApiRequest::Update { payload, .. } => {
                let (mutation, success) = match request {
                    ApiRequest::Create { .. } => (Mutation::Create, 201),
                    _ => (Mutation::Modify, 200),
                };
                match self.apply(mutation, payload.content(), payload.credentials()) {
                    Applied::Done | Applied::Unchanged => {
                        reply(success, self.stored().unwrap_or_default())
                    }
                    Applied::Rejected { status, reason } => {
                        reply(status, format!("%ERROR: {reason}\n"))
                    }
                }
            }
            ApiRequest::Delete {
                key, credentials, ..
            } => match self.lookup_text(key) {
                Some(current) => match self.apply(Mutation::Delete, &current, credentials) {
                    Applied::Rejected { status, reason } => {
                        reply(status, format!("%ERROR: {reason}\n"))
                    }
                    _ => reply(200, current),
                },
                None => reply(404, NOT_FOUND),
            },
            ApiRequest::Lookup { key, .. } | ApiRequest::Search { query: key } => {
                match self.lookup_text(key.trim()) {
                    Some(object) => reply(200, object),
                    None => reply(404, NOT_FOUND),
                }
            }
            ApiRequest::Metadata { object_type } => match self.template(object_type) {
                Some(template) => reply(200, template),
                None => reply(400, "%ERROR: unknown object type\n"),
            },
        };
        Ok(response)
    }
}

impl QuerySession for InMemoryBackend {
    fn query(&self, line: &str, _timeout: Duration) -> Result<String> {
        self.enter(Transport::InteractiveSession, format!("session {}", line.trim()))?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if let ["-t", object_type] = words.as_slice() {
            return Ok(self
                .template(object_type)
                .unwrap_or_else(|| "%ERROR:102: unknown object type\n".to_string()));
        }
        let type_filter = words
            .windows(2)
            .find(|pair| pair[0] == "-T")
            .map(|pair| pair[1]);
        let Some(key) = words.last() else {
            return Ok("%ERROR:106: no search key specified\n".to_string());
        };
        let object_type = self.state.borrow().record.object_type.clone();
        let type_ok = type_filter.is_none_or(|wanted| wanted.eq_ignore_ascii_case(&object_type));
        match self.lookup_text(key).filter(|_| type_ok) {
            Some(object) => Ok(format!("% Information related to '{key}'\n\n{object}\n")),
            None => Ok(NOT_FOUND.to_string()),
        }
    }
}

impl BatchUpdateClient for InMemoryBackend {
    fn submit(&self, content: &ContentWithCredentials, _timeout: Duration) -> Result<BatchReply> {
        self.enter(Transport::SyncBatch, "batch submit".to_string())?;
        Ok(BatchReply {
            status: 200,
            report: self.submit_update(content),
        })
    }
}

impl MailSubmitter for InMemoryBackend {
    fn submit(&self, message: &MailMessage, _timeout: Duration) -> Result<()> {
        self.enter(Transport::AsyncSubmission, "mail submit".to_string())?;
        let report = self.submit_update(&message.content);
        self.state.borrow_mut().acks.insert(
            message.message_id.clone(),
            format!("In-Reply-To: {}\n\n{report}", message.message_id),
        );
        Ok(())
    }

    fn acknowledgement(&self, message_id: &str) -> Result<Option<String>> {
        let mut state = self.state.borrow_mut();
        if state.ack_delay_polls > 0 {
            if state.ack_delay_polls != u32::MAX {
                state.ack_delay_polls -= 1;
            }
            return Ok(None);
        }
        Ok(state.acks.get(message_id).cloned())
    }
}

impl ReplicationStream for InMemoryBackend {
    fn current_serial(&self, _timeout: Duration) -> Result<u64> {
        self.enter(Transport::ReplicationStream, "stream serial".to_string())?;
        Ok(self.serial())
    }

    fn events_since(&self, from: u64, _timeout: Duration) -> Result<Vec<StreamEvent>> {
        self.enter(Transport::ReplicationStream, format!("stream events {from}"))?;
        Ok(self
            .state
            .borrow()
            .events
            .iter()
            .filter(|event| event.serial >= from)
            .cloned()
            .collect())
    }
}

impl RecordFixture for InMemoryBackend {
    fn apply_mode(&self, mode: Mode, _timeout: Duration) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("fixture mode {}", mode.name()));
        state.mode = mode;
        Ok(())
    }

    fn staging_mode(&self, _scenario_mode: Mode) -> Mode {
        Mode::Old
    }

    fn stage(&self, record: &TargetRecord, target: RecordState, _timeout: Duration) -> Result<()> {
        let (current, stored) = {
            let mut state = self.state.borrow_mut();
            state.calls.push(format!("fixture stage {}", target.name()));
            let current = state.record.state_of(state.stored.as_deref());
            (current, state.stored.clone())
        };
        if current == target {
            return Ok(());
        }
        let credentials = [Credential::Override {
            user: "fixture".to_string(),
            password: OVERRIDE_PASSWORD.to_string(),
            reason: None,
        }];
        let applied = match (target.exists(), stored) {
            (true, stored) => {
                let mutation = if stored.is_some() {
                    Mutation::Modify
                } else {
                    Mutation::Create
                };
                self.apply(mutation, &record.render(target.has_marker()), &credentials)
            }
            (false, Some(current)) => self.apply(Mutation::Delete, &current, &credentials),
            (false, None) => Applied::Unchanged,
        };
        if let Applied::Rejected { status, reason } = applied {
            bail!("staging {} refused with status {status}: {reason}", target.name());
        }
        let staged = self.record_state();
        if staged != target {
            bail!("could not stage {target}: backend holds {staged}");
        }
        Ok(())
    }

    fn observe(&self, _record: &TargetRecord, _timeout: Duration) -> Result<RecordState> {
        let mut state = self.state.borrow_mut();
        state.calls.push("fixture observe".to_string());
        Ok(state.record.state_of(state.stored.as_deref()))
    }
}

/// Shared, ordered log of runner calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }
}

/// Provider handing out [`RecordingRunner`]s that share one [`CallLog`].
#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    log: CallLog,
    fail_at: Option<&'static str>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runners fail with `"<step> failed"` when `step` is called.
    pub fn failing_at(step: &'static str) -> Self {
        Self {
            log: CallLog::default(),
            fail_at: Some(step),
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl RunnerProvider for RecordingProvider {
    fn resolve<'c>(
        &self,
        transport: Transport,
        _context: &'c ExecutionContext,
    ) -> Box<dyn ScenarioRunner + 'c> {
        self.log.push(format!("resolve {}", transport.name()));
        Box::new(RecordingRunner {
            transport,
            log: self.log.clone(),
            fail_at: self.fail_at,
        })
    }
}

/// Runner that records each call by method name.
#[derive(Debug)]
pub struct RecordingRunner {
    transport: Transport,
    log: CallLog,
    fail_at: Option<&'static str>,
}

impl RecordingRunner {
    fn record(&self, step: &'static str) -> Result<()> {
        self.log.push(step);
        if self.fail_at == Some(step) {
            bail!("{step} failed");
        }
        Ok(())
    }
}

impl ScenarioRunner for RecordingRunner {
    fn transport(&self) -> Transport {
        self.transport
    }

    fn before(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("before")
    }

    fn after(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("after")
    }

    fn create(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("create")
    }

    fn modify(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("modify")
    }

    fn delete(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("delete")
    }

    fn search(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("search")
    }

    fn fetch(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("fetch")
    }

    fn metadata_fetch(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("metadata_fetch")
    }

    fn event_notify(&mut self, _scenario: &Scenario) -> Result<()> {
        self.record("event_notify")
    }
}

/// Serve one HTTP exchange on a local port.
///
/// Returns the base URL and a handle yielding the raw request (head and body).
pub fn serve_http_once(
    status_line: &str,
    body: &str,
) -> Result<(String, JoinHandle<Result<String>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind http listener")?;
    let base = format!("http://{}", listener.local_addr()?);
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let handle = thread::spawn(move || -> Result<String> {
        let (stream, _) = listener.accept().context("accept http client")?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).context("read request head")? == 0 {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().context("parse content-length")?;
                }
            }
            let end_of_head = line == "\r\n";
            head.push_str(&line);
            if end_of_head {
                break;
            }
        }
        let mut request_body = vec![0u8; content_length];
        reader
            .read_exact(&mut request_body)
            .context("read request body")?;
        reader
            .get_mut()
            .write_all(response.as_bytes())
            .context("write response")?;
        head.push_str(&String::from_utf8_lossy(&request_body));
        Ok(head)
    });
    Ok((base, handle))
}

/// Serve one line-oriented query on a local port, replying with `reply` and
/// closing. The handle yields the received query line, trimmed.
pub fn serve_tcp_once(reply: &str) -> Result<(String, JoinHandle<Result<String>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind tcp listener")?;
    let address = listener.local_addr()?.to_string();
    let reply = reply.to_string();
    let handle = thread::spawn(move || -> Result<String> {
        let (stream, _) = listener.accept().context("accept tcp client")?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).context("read query line")?;
        reader
            .get_mut()
            .write_all(reply.as_bytes())
            .context("write reply")?;
        Ok(line.trim().to_string())
    });
    Ok((address, handle))
}
