//! Interactive line-oriented session seam.
//!
//! One query per connection: send a line, read until the server closes.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, instrument, warn};

use crate::core::budget::remaining_budget;

/// Abstraction over line-oriented query sessions.
pub trait QuerySession {
    /// Send one query line and return the full textual reply.
    fn query(&self, line: &str, timeout: Duration) -> Result<String>;
}

/// Query session over a plain TCP socket.
#[derive(Debug, Clone)]
pub struct TcpQuerySession {
    address: String,
    output_limit_bytes: usize,
}

impl TcpQuerySession {
    pub fn new(address: impl Into<String>, output_limit_bytes: usize) -> Self {
        Self {
            address: address.into(),
            output_limit_bytes,
        }
    }
}

impl QuerySession for TcpQuerySession {
    #[instrument(skip_all, fields(address = %self.address, timeout_secs = timeout.as_secs()))]
    fn query(&self, line: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let address = self
            .address
            .to_socket_addrs()
            .with_context(|| format!("resolve {}", self.address))?
            .next()
            .ok_or_else(|| anyhow!("{} resolved to no address", self.address))?;

        let mut stream = TcpStream::connect_timeout(&address, remaining_budget(deadline)?)
            .with_context(|| format!("connect {}", self.address))?;
        stream
            .set_write_timeout(Some(remaining_budget(deadline)?))
            .context("set write timeout")?;
        debug!(query = line.trim(), "sending query");
        stream
            .write_all(format!("{}\r\n", line.trim_end()).as_bytes())
            .context("write query")?;
        stream.flush().context("flush query")?;

        let bytes = read_until_closed(&mut stream, deadline, self.output_limit_bytes)?;
        debug!(bytes = bytes.len(), "query reply received");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Read until EOF, bounded by `deadline` and `limit`. Bytes past the limit are
/// drained and dropped.
fn read_until_closed(stream: &mut TcpStream, deadline: Instant, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        stream
            .set_read_timeout(Some(remaining_budget(deadline)?))
            .context("set read timeout")?;
        let n = match stream.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                bail!("query reply timed out");
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("read query reply"),
        };
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
    if dropped > 0 {
        warn!(dropped, "query reply truncated");
    }
    Ok(buf)
}
