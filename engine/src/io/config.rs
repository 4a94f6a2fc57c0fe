//! Engine configuration (TOML).
//!
//! One file describes where every transport lives, which credentials to use,
//! and what the target record looks like. Missing fields default to values
//! matching a local test deployment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::content::{Charset, Credential};
use crate::core::dimension::Mode;
use crate::core::record::TargetRecord;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Mode the backend runs in when no `[mode_switch]` command is set.
    pub mode: Mode,

    /// Upper bound for one runner operation, including polling, in seconds.
    pub operation_timeout_secs: u64,

    /// Delay between polls of asynchronous transports, in milliseconds.
    pub poll_interval_millis: u64,

    /// Truncate replies and command output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Encoding of submitted content.
    pub charset: Charset,

    pub record: TargetRecord,
    pub credentials: CredentialsConfig,
    pub web_api: WebApiConfig,
    pub session: SessionConfig,
    pub batch: BatchConfig,
    pub mail: MailConfig,
    pub stream: StreamConfig,
    pub mode_switch: ModeSwitchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Attached to submissions made by the transport under test.
    pub submit: Vec<Credential>,
    /// Used by the fixture to stage and observe the record.
    pub fixture: Vec<Credential>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            submit: vec![Credential::password("conformance")],
            fixture: vec![Credential::Override {
                user: "dbase".to_string(),
                password: "override".to_string(),
                reason: Some("conformance fixture".to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebApiConfig {
    pub base_url: String,
    pub source: String,
}

impl Default for WebApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1080/whois".to_string(),
            source: "TEST".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// `host:port` of the query service.
    pub address: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: "localhost:1043".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchConfig {
    pub url: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:1080/whois/syncupdates/test".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Submit command; the message is written to its stdin.
    pub command: Vec<String>,
    /// Directory acknowledgements are delivered into.
    pub ack_dir: PathBuf,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "conformance@example.net".to_string(),
            to: "auto-dbm@example.net".to_string(),
            subject: "conformance update".to_string(),
            command: vec!["sendmail".to_string(), "-t".to_string()],
            ack_dir: PathBuf::from("acks"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    /// `host:port` of the replication service.
    pub address: String,
    pub source: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            address: "localhost:1044".to_string(),
            source: "TEST".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModeSwitchConfig {
    /// Command switching the backend mode; `{mode}` is replaced by `old` or
    /// `new`. Empty means the backend stays in the top-level `mode`.
    pub command: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Old,
            operation_timeout_secs: 30,
            poll_interval_millis: 500,
            output_limit_bytes: 1_000_000,
            charset: Charset::default(),
            record: TargetRecord::default(),
            credentials: CredentialsConfig::default(),
            web_api: WebApiConfig::default(),
            session: SessionConfig::default(),
            batch: BatchConfig::default(),
            mail: MailConfig::default(),
            stream: StreamConfig::default(),
            mode_switch: ModeSwitchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout_secs == 0 {
            return Err(anyhow!("operation_timeout_secs must be > 0"));
        }
        if self.poll_interval_millis == 0 {
            return Err(anyhow!("poll_interval_millis must be > 0"));
        }
        if self.poll_interval_millis >= self.operation_timeout_secs.saturating_mul(1000) {
            return Err(anyhow!(
                "poll_interval_millis must be shorter than operation_timeout_secs"
            ));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.record.object_type.trim().is_empty() || self.record.key.trim().is_empty() {
            return Err(anyhow!("record.object_type and record.key must be set"));
        }
        if self.record.marker_attribute.trim().is_empty() {
            return Err(anyhow!("record.marker_attribute must be set"));
        }
        if self.record.carries_marker(&self.record.body) {
            return Err(anyhow!(
                "record.body must not contain the {} attribute",
                self.record.marker_attribute
            ));
        }
        if self.credentials.fixture.is_empty() {
            return Err(anyhow!("credentials.fixture must not be empty"));
        }
        if self.mail.command.is_empty() || self.mail.command[0].trim().is_empty() {
            return Err(anyhow!("mail.command must be a non-empty array"));
        }
        if self
            .mode_switch
            .command
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(anyhow!("mode_switch.command must start with a program"));
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
