//! Web API transport seam.
//!
//! The [`WebApiClient`] trait decouples runners from the HTTP stack. The real
//! client speaks plain-text objects to a REST endpoint laid out as
//! `{base}/{source}/{type}/{key}`; tests substitute an in-memory backend.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::content::{Charset, ContentWithCredentials, Credential};

/// One web API call.
#[derive(Debug, Clone, Copy)]
pub enum ApiRequest<'a> {
    Create {
        object_type: &'a str,
        payload: &'a ContentWithCredentials,
    },
    Update {
        object_type: &'a str,
        key: &'a str,
        payload: &'a ContentWithCredentials,
    },
    Delete {
        object_type: &'a str,
        key: &'a str,
        credentials: &'a [Credential],
    },
    Lookup {
        object_type: &'a str,
        key: &'a str,
        /// Ask for the stored object without output filtering.
        unfiltered: bool,
    },
    Search {
        query: &'a str,
    },
    Metadata {
        object_type: &'a str,
    },
}

impl ApiRequest<'_> {
    pub fn method(&self) -> &'static str {
        match self {
            ApiRequest::Create { .. } => "POST",
            ApiRequest::Update { .. } => "PUT",
            ApiRequest::Delete { .. } => "DELETE",
            ApiRequest::Lookup { .. } | ApiRequest::Search { .. } | ApiRequest::Metadata { .. } => {
                "GET"
            }
        }
    }
}

/// Status and text body of a web API reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over web API backends.
pub trait WebApiClient {
    /// Perform the call. Non-2xx replies are returned, not raised; errors mean
    /// the exchange itself failed.
    fn send(&self, request: &ApiRequest<'_>, timeout: Duration) -> Result<ApiResponse>;
}

/// Blocking HTTP client for the web API.
#[derive(Debug, Clone)]
pub struct HttpWebApi {
    base_url: String,
    source: String,
}

impl HttpWebApi {
    pub fn new(base_url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source: source.into(),
        }
    }

    fn url(&self, request: &ApiRequest<'_>) -> String {
        let base = &self.base_url;
        let source = &self.source;
        match request {
            ApiRequest::Create { object_type, .. } => format!("{base}/{source}/{object_type}"),
            ApiRequest::Update {
                object_type, key, ..
            }
            | ApiRequest::Delete {
                object_type, key, ..
            }
            | ApiRequest::Lookup {
                object_type, key, ..
            } => format!("{base}/{source}/{object_type}/{key}"),
            ApiRequest::Search { .. } => format!("{base}/search"),
            ApiRequest::Metadata { object_type } => {
                format!("{base}/metadata/templates/{object_type}")
            }
        }
    }
}

/// Agent with a global timeout that hands back non-2xx replies.
pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

pub(crate) fn content_type(charset: Charset) -> String {
    format!("text/plain; charset={}", charset.name())
}

fn with_credentials<B>(
    mut builder: ureq::RequestBuilder<B>,
    credentials: &[Credential],
) -> ureq::RequestBuilder<B> {
    for credential in credentials {
        let (name, value) = credential.query_param();
        builder = builder.query(name, value);
    }
    builder
}

impl WebApiClient for HttpWebApi {
    #[instrument(skip_all, fields(method = request.method(), timeout_secs = timeout.as_secs()))]
    fn send(&self, request: &ApiRequest<'_>, timeout: Duration) -> Result<ApiResponse> {
        let url = self.url(request);
        let agent = agent(timeout);
        debug!(url = %url, "sending web api request");

        let result = match request {
            ApiRequest::Create { payload, .. } => {
                with_credentials(agent.post(&url), payload.credentials())
                    .header("Content-Type", content_type(payload.charset()))
                    .header("Accept", "text/plain")
                    .send(&payload.charset().encode(payload.content())[..])
            }
            ApiRequest::Update { payload, .. } => {
                with_credentials(agent.put(&url), payload.credentials())
                    .header("Content-Type", content_type(payload.charset()))
                    .header("Accept", "text/plain")
                    .send(&payload.charset().encode(payload.content())[..])
            }
            ApiRequest::Delete { credentials, .. } => with_credentials(agent.delete(&url), credentials)
                .header("Accept", "text/plain")
                .call(),
            ApiRequest::Lookup { unfiltered, .. } => {
                let mut builder = agent.get(&url).header("Accept", "text/plain");
                if *unfiltered {
                    builder = builder.query("unfiltered", "");
                }
                builder.call()
            }
            ApiRequest::Search { query } => agent
                .get(&url)
                .query("query-string", *query)
                .query("source", &self.source)
                .header("Accept", "text/plain")
                .call(),
            ApiRequest::Metadata { .. } => agent.get(&url).header("Accept", "text/plain").call(),
        };

        let mut response = result.with_context(|| format!("{} {}", request.method(), url))?;
        let status = response.status().as_u16();
        let bytes = response
            .body_mut()
            .read_to_vec()
            .with_context(|| format!("read body of {url}"))?;
        debug!(status, bytes = bytes.len(), "web api reply");
        Ok(ApiResponse {
            status,
            body: Charset::Utf8.decode(&bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_http_once;

    #[test]
    fn urls_follow_resource_layout() {
        let client = HttpWebApi::new("http://db.example/api/", "TEST");
        let payload = ContentWithCredentials::new("person: X");
        assert_eq!(
            client.url(&ApiRequest::Create {
                object_type: "person",
                payload: &payload,
            }),
            "http://db.example/api/TEST/person"
        );
        assert_eq!(
            client.url(&ApiRequest::Lookup {
                object_type: "person",
                key: "CT1-TEST",
                unfiltered: true,
            }),
            "http://db.example/api/TEST/person/CT1-TEST"
        );
        assert_eq!(
            client.url(&ApiRequest::Metadata {
                object_type: "person"
            }),
            "http://db.example/api/metadata/templates/person"
        );
    }

    #[test]
    fn non_success_status_is_returned() {
        let (base, server) = serve_http_once("404 Not Found", "%ERROR:101: no entries found\n")
            .expect("server");
        let client = HttpWebApi::new(base, "TEST");
        let response = client
            .send(
                &ApiRequest::Lookup {
                    object_type: "person",
                    key: "CT1-TEST",
                    unfiltered: false,
                },
                Duration::from_secs(5),
            )
            .expect("send");
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        let head = server.join().expect("join").expect("request");
        assert!(head.starts_with("GET /TEST/person/CT1-TEST"));
    }

    #[test]
    fn create_posts_payload_with_password() {
        let (base, server) = serve_http_once("201 Created", "person: X\n").expect("server");
        let client = HttpWebApi::new(base, "TEST");
        let payload = ContentWithCredentials::with_credentials(
            "person: X\n",
            vec![Credential::password("secret")],
        );
        let response = client
            .send(
                &ApiRequest::Create {
                    object_type: "person",
                    payload: &payload,
                },
                Duration::from_secs(5),
            )
            .expect("send");
        assert!(response.is_success());
        let request = server.join().expect("join").expect("request");
        assert!(request.starts_with("POST /TEST/person?password=secret"));
        assert!(request.ends_with("person: X\n"));
    }
}
