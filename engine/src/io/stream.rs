//! Replication stream seam.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::budget::remaining_budget;
use crate::core::response::{StreamEvent, parse_current_serial, parse_stream};
use crate::io::session::{QuerySession, TcpQuerySession};

/// Abstraction over replication streams.
pub trait ReplicationStream {
    /// Serial of the most recent event.
    fn current_serial(&self, timeout: Duration) -> Result<u64>;

    /// Events with serial `>= from`, oldest first. Empty when nothing newer exists.
    fn events_since(&self, from: u64, timeout: Duration) -> Result<Vec<StreamEvent>>;
}

/// Replication client speaking the query protocol (`-q sources`, `-g`).
#[derive(Debug, Clone)]
pub struct TcpReplicationStream {
    session: TcpQuerySession,
    source: String,
}

impl TcpReplicationStream {
    pub fn new(session: TcpQuerySession, source: impl Into<String>) -> Self {
        Self {
            session,
            source: source.into(),
        }
    }
}

impl ReplicationStream for TcpReplicationStream {
    fn current_serial(&self, timeout: Duration) -> Result<u64> {
        let reply = self
            .session
            .query("-q sources", timeout)
            .context("query replication sources")?;
        parse_current_serial(&reply, &self.source)
    }

    #[instrument(skip_all, fields(source = %self.source, from = from))]
    fn events_since(&self, from: u64, timeout: Duration) -> Result<Vec<StreamEvent>> {
        let deadline = Instant::now() + timeout;
        let last = self.current_serial(remaining_budget(deadline)?)?;
        if from > last {
            debug!(last, "no events past serial");
            return Ok(Vec::new());
        }
        let reply = self
            .session
            .query(
                &format!("-g {}:3:{}-LAST", self.source, from),
                remaining_budget(deadline)?,
            )
            .with_context(|| format!("stream {} from serial {from}", self.source))?;
        let events = parse_stream(&reply)?;
        debug!(count = events.len(), "replication events received");
        Ok(events)
    }
}
