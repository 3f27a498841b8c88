//! Relays granted requests to their session's target host.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use corsgate_core::SessionStore;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use super::headers::rewrite_headers;

/// Reply to a relayed request.
#[derive(Debug)]
pub enum ForwardReply {
    /// CORS preflight, answered locally. The target is never contacted.
    Preflight,
    /// The target answered; relay its response with rewritten CORS headers.
    Proxied(ProxiedResponse),
}

/// Everything the HTTP layer needs to answer the browser.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    /// Origin the session was granted to; becomes the CORS allow-origin.
    pub allow_origin: String,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Sends rewritten requests to target hosts over plain HTTP.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    store: Arc<SessionStore>,
    client: reqwest::Client,
}

impl ProxyForwarder {
    /// Build a forwarder with a hard per-request timeout towards targets.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the HTTP client cannot be built.
    pub fn new(
        store: Arc<SessionStore>,
        upstream_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(upstream_timeout).build()?;
        Ok(Self { store, client })
    }

    /// Relay one request addressed to `session_id`.
    ///
    /// # Errors
    ///
    /// Fails when the session is unknown, the target URL cannot be built,
    /// the target is unreachable, or its response body cannot be read.
    pub async fn forward(
        &self,
        session_id: &str,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<ForwardReply, ForwardError> {
        let Some(session) = self.store.lookup(session_id).await else {
            return Err(ForwardError::InvalidSession(session_id.to_owned()));
        };

        // Preflights are answered by the proxy itself.
        if method == Method::OPTIONS {
            return Ok(ForwardReply::Preflight);
        }

        let target = build_target_url(&session.target_host, path, query).map_err(|error| {
            warn!(target_host = %session.target_host, %error, "Failed to build target URL");
            ForwardError::BadTargetUrl(error)
        })?;

        info!(path = %path, target = %target, "Proxying request");

        let response = self
            .client
            .request(method, target)
            .headers(rewrite_headers(headers))
            .body(body)
            .send()
            .await
            .map_err(|error| {
                warn!(%error, "Upstream request failed");
                ForwardError::Upstream(error)
            })?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(|error| {
            warn!(%error, "Failed to read upstream response");
            ForwardError::UpstreamBody(error)
        })?;

        Ok(ForwardReply::Proxied(ProxiedResponse {
            status,
            allow_origin: session.origin,
            content_type,
            body,
        }))
    }
}

/// Join target host, relative path, and query into the outbound URL.
fn build_target_url(
    target_host: &str,
    path: &str,
    query: Option<&str>,
) -> Result<Url, url::ParseError> {
    let mut target = format!("http://{target_host}/{path}");
    if let Some(query) = query {
        if !query.is_empty() {
            target.push('?');
            target.push_str(query);
        }
    }
    Url::parse(&target)
}

/// Failure modes of relaying one request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// No session with this id exists.
    #[error("unknown session: {0}")]
    InvalidSession(String),
    /// The session's target host and the request path do not form a valid URL.
    #[error("invalid target URL: {0}")]
    BadTargetUrl(#[source] url::ParseError),
    /// The target could not be reached or did not answer in time.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),
    /// The target answered but its body could not be read.
    #[error("failed to read upstream response: {0}")]
    UpstreamBody(#[source] reqwest::Error),
}
