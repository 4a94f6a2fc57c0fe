//! Parsers for the textual replies transports send back.
//!
//! All functions here are pure; the clients in `io` hand them raw text.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;

use crate::core::dimension::{Operation, Outcome};
use crate::core::record::TargetRecord;

/// Action reported in a submission acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckAction {
    Create,
    Modify,
    Delete,
    /// Submission was identical to the stored object.
    Noop,
}

/// One per-object line of an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckLine {
    pub action: AckAction,
    pub succeeded: bool,
    pub object_type: String,
    pub key: String,
}

/// Parse `Create SUCCEEDED: [person] KEY ...` style lines.
pub fn parse_acknowledgement(report: &str) -> Vec<AckLine> {
    static ACK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?m)^(?:(Create|Modify|Delete) (SUCCEEDED|FAILED)|(No operation)):\s*\[([^\]]+)\]\s+(\S+)",
        )
        .unwrap()
    });

    ACK_RE
        .captures_iter(report)
        .map(|caps| {
            let (action, succeeded) = match (caps.get(1), caps.get(2)) {
                (Some(action), Some(status)) => {
                    let action = match action.as_str() {
                        "Create" => AckAction::Create,
                        "Modify" => AckAction::Modify,
                        _ => AckAction::Delete,
                    };
                    (action, status.as_str() == "SUCCEEDED")
                }
                _ => (AckAction::Noop, true),
            };
            AckLine {
                action,
                succeeded,
                object_type: caps[4].trim().to_string(),
                key: caps[5].to_string(),
            }
        })
        .collect()
}

/// Outcome of a mutation as reported by an acknowledgement.
///
/// Success needs a SUCCEEDED line for the expected action and key. A no-op
/// line counts as a successful modify.
pub fn submission_outcome(acks: &[AckLine], operation: Operation, key: &str) -> Outcome {
    let expected = match operation {
        Operation::Create => AckAction::Create,
        Operation::Modify => AckAction::Modify,
        Operation::Delete => AckAction::Delete,
        _ => return Outcome::Failure,
    };
    let succeeded = acks
        .iter()
        .filter(|ack| ack.key.eq_ignore_ascii_case(key))
        .any(|ack| {
            (ack.action == expected && ack.succeeded)
                || (expected == AckAction::Modify && ack.action == AckAction::Noop)
        });
    Outcome::from_success(succeeded)
}

/// Objects and error lines of a query reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResponse {
    pub objects: Vec<String>,
    pub errors: Vec<String>,
}

impl QueryResponse {
    pub fn find(&self, record: &TargetRecord) -> Option<&str> {
        self.objects
            .iter()
            .map(String::as_str)
            .find(|object| record.matches(object))
    }
}

/// Split a reply into blank-line separated objects, dropping `%` comments.
pub fn parse_query_response(text: &str) -> QueryResponse {
    let mut response = QueryResponse::default();
    for block in paragraphs(text) {
        let mut object = String::new();
        for line in block {
            if let Some(error) = line.strip_prefix("%ERROR:") {
                response.errors.push(error.trim().to_string());
            } else if !line.starts_with('%') {
                object.push_str(line);
                object.push('\n');
            }
        }
        if !object.trim().is_empty() {
            response.objects.push(object);
        }
    }
    response
}

/// Kind of a replication event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Del,
}

/// One event from the replication stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub serial: u64,
    pub kind: EventKind,
    pub object: String,
}

/// Parse an `ADD n` / `DEL n` stream between `%START` and `%END`.
pub fn parse_stream(text: &str) -> Result<Vec<StreamEvent>> {
    let mut events = Vec::new();
    let mut pending: Option<(EventKind, u64)> = None;
    for block in paragraphs(text) {
        if let Some(error) = block.iter().find_map(|line| line.strip_prefix("%ERROR:")) {
            bail!("replication stream error: {}", error.trim());
        }
        let lines: Vec<&str> = block
            .iter()
            .copied()
            .filter(|line| !line.starts_with('%'))
            .collect();
        if lines.is_empty() {
            continue;
        }
        match pending.take() {
            Some((kind, serial)) => {
                let mut object = lines.join("\n");
                object.push('\n');
                events.push(StreamEvent {
                    serial,
                    kind,
                    object,
                });
            }
            None => {
                pending = Some(parse_event_header(lines[0])?);
            }
        }
    }
    if let Some((_, serial)) = pending {
        bail!("replication event {serial} has no object");
    }
    Ok(events)
}

fn parse_event_header(line: &str) -> Result<(EventKind, u64)> {
    let mut parts = line.split_whitespace();
    let kind = match parts.next() {
        Some("ADD") => EventKind::Add,
        Some("DEL") => EventKind::Del,
        _ => bail!("unexpected replication line `{line}`"),
    };
    let serial = parts
        .next()
        .ok_or_else(|| anyhow!("replication event `{line}` has no serial"))?
        .parse::<u64>()
        .with_context(|| format!("parse serial in `{line}`"))?;
    Ok((kind, serial))
}

/// Last serial of `source` from a `SOURCE:3:X:first-last` line.
pub fn parse_current_serial(text: &str, source: &str) -> Result<u64> {
    for line in text.lines() {
        let fields: Vec<&str> = line.trim().split(':').collect();
        if fields.len() == 4 && fields[0].eq_ignore_ascii_case(source) {
            let (_, last) = fields[3]
                .split_once('-')
                .ok_or_else(|| anyhow!("malformed serial range `{}`", fields[3]))?;
            return last
                .trim()
                .parse::<u64>()
                .with_context(|| format!("parse serial `{last}`"));
        }
    }
    bail!("source {source} not listed in replication sources")
}

/// Most recent event touching the record.
pub fn latest_event_for<'a>(
    events: &'a [StreamEvent],
    record: &TargetRecord,
) -> Option<&'a StreamEvent> {
    events.iter().rev().find(|event| record.matches(&event.object))
}

fn paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}
