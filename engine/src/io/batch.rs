//! Synchronous batch update seam.
//!
//! A batch carries object text plus credential lines in one form post; the
//! reply is an acknowledgement report listing what happened per object.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::content::{Charset, ContentWithCredentials};
use crate::io::web_api::agent;

/// Status and acknowledgement text of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReply {
    pub status: u16,
    pub report: String,
}

/// Abstraction over synchronous batch update backends.
pub trait BatchUpdateClient {
    fn submit(&self, content: &ContentWithCredentials, timeout: Duration) -> Result<BatchReply>;
}

/// Form-post batch client.
#[derive(Debug, Clone)]
pub struct HttpBatchUpdate {
    url: String,
}

impl HttpBatchUpdate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl BatchUpdateClient for HttpBatchUpdate {
    #[instrument(skip_all, fields(url = %self.url, timeout_secs = timeout.as_secs()))]
    fn submit(&self, content: &ContentWithCredentials, timeout: Duration) -> Result<BatchReply> {
        let body = format!("DATA={}", form_encode(&content.to_bytes()));
        debug!(bytes = body.len(), "posting batch");
        let mut response = agent(timeout)
            .post(&self.url)
            .header(
                "Content-Type",
                format!(
                    "application/x-www-form-urlencoded; charset={}",
                    content.charset().name()
                ),
            )
            .send(body.as_bytes())
            .with_context(|| format!("POST {}", self.url))?;
        let status = response.status().as_u16();
        let bytes = response
            .body_mut()
            .read_to_vec()
            .with_context(|| format!("read body of {}", self.url))?;
        Ok(BatchReply {
            status,
            report: Charset::Utf8.decode(&bytes),
        })
    }
}

/// `application/x-www-form-urlencoded` encoding of raw bytes.
fn form_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &byte in bytes {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                out.push(char::from(byte));
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
