//! Submitted text bundled with the credentials that authorise it.

use serde::{Deserialize, Serialize};

/// Authentication material attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    Password {
        password: String,
    },
    /// Administrative override; bypasses ownership checks.
    Override {
        user: String,
        password: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Credential::Password {
            password: password.into(),
        }
    }

    fn value(&self) -> String {
        match self {
            Credential::Password { password } => password.clone(),
            Credential::Override {
                user,
                password,
                reason,
            } => match reason {
                Some(reason) => format!("{user},{password},{reason}"),
                None => format!("{user},{password}"),
            },
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Credential::Password { .. } => "password",
            Credential::Override { .. } => "override",
        }
    }

    /// Line appended to a batch or mail submission, e.g. `password: secret`.
    pub fn submission_line(&self) -> String {
        format!("{}: {}", self.keyword(), self.value())
    }

    /// Query parameter for the web API, e.g. `("password", "secret")`.
    pub fn query_param(&self) -> (&'static str, String) {
        (self.keyword(), self.value())
    }
}

/// Character encoding of a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Charset {
    #[default]
    Latin1,
    Utf8,
}

impl Charset {
    /// IANA name, as used in `Content-Type` headers.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Utf8 => "UTF-8",
        }
    }

    /// Encode text; Latin-1 replaces code points above U+00FF with `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Charset::Latin1 => text
                .chars()
                .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
                .collect(),
            Charset::Utf8 => text.as_bytes().to_vec(),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Latin1 => bytes.iter().map(|&byte| char::from(byte)).collect(),
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Raw submitted text, its credentials (possibly none) and its encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentWithCredentials {
    content: String,
    credentials: Vec<Credential>,
    charset: Charset,
}

impl ContentWithCredentials {
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_credentials_and_charset(content, Vec::new(), Charset::default())
    }

    pub fn with_charset(content: impl Into<String>, charset: Charset) -> Self {
        Self::with_credentials_and_charset(content, Vec::new(), charset)
    }

    pub fn with_credentials(content: impl Into<String>, credentials: Vec<Credential>) -> Self {
        Self::with_credentials_and_charset(content, credentials, Charset::default())
    }

    pub fn with_credentials_and_charset(
        content: impl Into<String>,
        credentials: Vec<Credential>,
        charset: Charset,
    ) -> Self {
        Self {
            content: content.into(),
            credentials,
            charset,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Content followed by one line per credential.
    pub fn render(&self) -> String {
        let mut out = self.content.trim_end().to_string();
        out.push('\n');
        for credential in &self.credentials {
            out.push_str(&credential.submission_line());
            out.push('\n');
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.charset.encode(&self.render())
    }
}
