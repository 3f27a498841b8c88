//! HTTP handlers: the grant endpoint and the catch-all relay route.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use corsgate_core::{ErrorEnvelope, GateError};
use tracing::warn;
use url::form_urlencoded;

use super::AppState;
use crate::proxy::{ForwardError, ForwardReply, ProxiedResponse};

/// Content type for grant replies and error envelopes.
const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Methods advertised to preflights.
const PREFLIGHT_METHODS: &str = "GET, POST, OPTIONS";

/// Cap on the grant form body; generous for a form with two short fields.
const FORM_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Relayed bodies are passed through whole, without a cap.
const RELAY_BODY_LIMIT: usize = usize::MAX;

/// `GET|POST /require_permission` - resolve an (origin, host) pairing to a
/// session id, prompting the user when the pairing is new.
pub(super) async fn require_permission(
    State(state): State<AppState>,
    request: Request,
) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let query = request.uri().query().unwrap_or_default().to_owned();
    let use_body = form_body_expected(request.method(), request.headers());

    let body = if use_body {
        to_bytes(request.into_body(), FORM_BODY_LIMIT)
            .await
            .unwrap_or_default()
    } else {
        Bytes::new()
    };
    let host = form_value(&body, &query, "host");

    match state.auth.authorize(&origin, &host).await {
        Ok(session_id) => grant_success(&session_id),
        Err(error) => gate_error(error),
    }
}

/// Catch-all `/{sessionID}/{...path}` - relay a granted request.
pub(super) async fn relay(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    let (session_id, path) = {
        let (session_id, path) = split_session_path(request.uri().path());
        (session_id.to_owned(), path.to_owned())
    };
    let query = request.uri().query().map(str::to_owned);
    let headers = request.headers().clone();

    let body = match to_bytes(request.into_body(), RELAY_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(%error, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Error reading request body").into_response();
        }
    };

    match state
        .forwarder
        .forward(&session_id, method, &path, query.as_deref(), &headers, body)
        .await
    {
        Ok(ForwardReply::Preflight) => preflight_response(),
        Ok(ForwardReply::Proxied(reply)) => proxied_response(reply),
        Err(ForwardError::InvalidSession(_)) => gate_error(GateError::InvalidSession),
        Err(ForwardError::BadTargetUrl(_)) => {
            upstream_failure(StatusCode::INTERNAL_SERVER_ERROR, "Error creating request")
        }
        Err(ForwardError::Upstream(_)) => {
            upstream_failure(StatusCode::BAD_GATEWAY, "Error forwarding request")
        }
        Err(ForwardError::UpstreamBody(_)) => {
            upstream_failure(StatusCode::INTERNAL_SERVER_ERROR, "Error reading response")
        }
    }
}

/// 200 with the session id as a bare JSON string.
fn grant_success(session_id: &str) -> Response {
    let body = serde_json::to_string(session_id).unwrap_or_default();
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, JSON_UTF8),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

/// 400 with the `{code, msg}` envelope.
fn gate_error(error: GateError) -> Response {
    let body = serde_json::to_string(&ErrorEnvelope::from(error)).unwrap_or_default();
    (
        StatusCode::BAD_REQUEST,
        [
            (CONTENT_TYPE, JSON_UTF8),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

/// 204 with permissive CORS; preflights never reach the target.
fn preflight_response() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, PREFLIGHT_METHODS),
            (ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
        .into_response()
}

/// Relay the upstream reply, allow-origin pinned to the session's origin.
fn proxied_response(reply: ProxiedResponse) -> Response {
    let mut response = (reply.status, Body::from(reply.body)).into_response();
    if let Ok(origin) = HeaderValue::from_str(&reply.allow_origin) {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    if let Some(content_type) = reply.content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

/// Plain-text upstream failure; the forwarder already logged the cause.
fn upstream_failure(status: StatusCode, message: &'static str) -> Response {
    (status, [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], message).into_response()
}

/// Split `/{sessionID}/{...path}` into its id and remainder.
fn split_session_path(path: &str) -> (&str, &str) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.split_once('/') {
        Some((session_id, rest)) => (session_id, rest),
        None => (trimmed, ""),
    }
}

/// Whether the request body should be parsed as an urlencoded form.
fn form_body_expected(method: &Method, headers: &HeaderMap) -> bool {
    let method_has_form =
        *method == Method::POST || *method == Method::PUT || *method == Method::PATCH;
    if !method_has_form {
        return false;
    }
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .eq_ignore_ascii_case("application/x-www-form-urlencoded")
}

/// First value for `key`: body fields first, then the URL query.
fn form_value(body: &[u8], query: &str, key: &str) -> String {
    form_urlencoded::parse(body)
        .chain(form_urlencoded::parse(query.as_bytes()))
        .find_map(|(name, value)| (name == key).then(|| value.into_owned()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_session_and_path() {
        assert_eq!(split_session_path("/abc/users/1"), ("abc", "users/1"));
        assert_eq!(split_session_path("/abc/"), ("abc", ""));
        assert_eq!(split_session_path("/abc"), ("abc", ""));
        assert_eq!(split_session_path("/"), ("", ""));
    }

    #[test]
    fn body_fields_take_precedence_over_query() {
        assert_eq!(
            form_value(b"host=from-body", "host=from-query", "host"),
            "from-body"
        );
    }

    #[test]
    fn query_is_the_fallback() {
        assert_eq!(form_value(b"", "host=api.local%3A8080", "host"), "api.local:8080");
    }

    #[test]
    fn missing_field_is_empty() {
        assert_eq!(form_value(b"other=1", "x=2", "host"), "");
    }

    fn headers_with_content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn urlencoded_post_reads_the_body() {
        let headers = headers_with_content_type("application/x-www-form-urlencoded");
        assert!(form_body_expected(&Method::POST, &headers));
    }

    #[test]
    fn charset_parameter_is_tolerated() {
        let headers = headers_with_content_type("application/x-www-form-urlencoded; charset=UTF-8");
        assert!(form_body_expected(&Method::POST, &headers));
    }

    #[test]
    fn get_never_reads_the_body() {
        let headers = headers_with_content_type("application/x-www-form-urlencoded");
        assert!(!form_body_expected(&Method::GET, &headers));
    }

    #[test]
    fn other_content_types_are_ignored() {
        let headers = headers_with_content_type("application/json");
        assert!(!form_body_expected(&Method::POST, &headers));
    }
}
