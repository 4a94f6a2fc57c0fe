//! Asynchronous mail submission seam.
//!
//! A submission is a plain-text message handed to a local submit command.
//! The update service answers asynchronously; its acknowledgements land as
//! files in a directory and are matched back by `Message-ID`.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use minijinja::{Environment, context};
use tracing::{debug, instrument};

use crate::core::content::ContentWithCredentials;
use crate::io::process::{command_from_argv, run_command_with_timeout};

const SUBMISSION_TEMPLATE: &str = include_str!("templates/submission.eml");

static MESSAGE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// One outgoing update message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub message_id: String,
    pub content: ContentWithCredentials,
}

impl MailMessage {
    /// Message with a freshly generated `Message-ID`.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        content: ContentWithCredentials,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            message_id: next_message_id(),
            content,
        }
    }

    /// Full RFC 5322 text, headers included.
    pub fn render(&self) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("submission", SUBMISSION_TEMPLATE)
            .context("load submission template")?;
        let template = env.get_template("submission")?;
        let rendered = template.render(context! {
            from => self.from,
            to => self.to,
            subject => self.subject,
            message_id => self.message_id,
            date => Utc::now().to_rfc2822(),
            charset => self.content.charset().name(),
            body => self.content.render(),
        })?;
        Ok(rendered)
    }
}

fn next_message_id() -> String {
    let sequence = MESSAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "<{}.{}.{}@conformance.invalid>",
        Utc::now().format("%Y%m%d%H%M%S%6f"),
        std::process::id(),
        sequence
    )
}

/// Abstraction over mail submission backends.
pub trait MailSubmitter {
    /// Hand the message over for delivery.
    fn submit(&self, message: &MailMessage, timeout: Duration) -> Result<()>;

    /// Acknowledgement text for a submitted message, once it has arrived.
    fn acknowledgement(&self, message_id: &str) -> Result<Option<String>>;
}

/// Submits through a local command (e.g. `sendmail -t`) and reads
/// acknowledgements from a spool directory.
#[derive(Debug, Clone)]
pub struct CommandMailSubmitter {
    command: Vec<String>,
    ack_dir: PathBuf,
    output_limit_bytes: usize,
}

impl CommandMailSubmitter {
    pub fn new(
        command: Vec<String>,
        ack_dir: impl Into<PathBuf>,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            command,
            ack_dir: ack_dir.into(),
            output_limit_bytes,
        }
    }
}

impl MailSubmitter for CommandMailSubmitter {
    #[instrument(skip_all, fields(message_id = %message.message_id, timeout_secs = timeout.as_secs()))]
    fn submit(&self, message: &MailMessage, timeout: Duration) -> Result<()> {
        let text = message.render()?;
        let bytes = message.content.charset().encode(&text);
        let cmd = command_from_argv(&self.command)?;
        let output = run_command_with_timeout(cmd, Some(&bytes), timeout, self.output_limit_bytes)
            .with_context(|| format!("run mail command {:?}", self.command))?;
        if output.timed_out {
            bail!("mail command timed out after {}s", timeout.as_secs());
        }
        if !output.status.success() {
            bail!(
                "mail command exited with {:?}: {}",
                output.status.code(),
                output.stderr_text()
            );
        }
        debug!(bytes = bytes.len(), "message submitted");
        Ok(())
    }

    fn acknowledgement(&self, message_id: &str) -> Result<Option<String>> {
        if !self.ack_dir.exists() {
            return Ok(None);
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.ack_dir)
            .with_context(|| format!("read {}", self.ack_dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        for path in paths {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let text = String::from_utf8_lossy(&bytes);
            if text.contains(message_id) {
                debug!(path = %path.display(), "acknowledgement found");
                return Ok(Some(text.into_owned()));
            }
        }
        Ok(None)
    }
}
