//! Wire-level error taxonomy for corsgate endpoints.
//!
//! Every local rejection is reported to the HTTP caller as a numeric code
//! plus a human-readable string, wrapped in a small JSON envelope. Upstream
//! transport failures are deliberately not part of this taxonomy; they
//! surface as plain 5xx responses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to HTTP callers as `{code, msg}` JSON envelopes.
///
/// The `Display` strings are the exact `msg` values on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// The authority rejected the request, or its deadline elapsed.
    #[error("permission denied")]
    PermissionDenied,

    /// Grant request arrived without an `Origin` header.
    #[error("require origin in header")]
    RequireOrigin,

    /// Grant request arrived without a `host` form field.
    #[error("require host in form")]
    RequireHost,

    /// Relay request named a session ID this process never issued.
    #[error("invalid session")]
    InvalidSession,
}

impl GateError {
    /// Numeric code carried in the JSON envelope.
    pub const fn code(self) -> u16 {
        match self {
            Self::PermissionDenied => 101,
            Self::RequireOrigin => 102,
            Self::RequireHost => 103,
            Self::InvalidSession => 104,
        }
    }
}

/// JSON body returned with HTTP 400 on any gate-level rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Stable numeric code, see [`GateError::code`].
    pub code: u16,
    /// Human-readable message.
    pub msg: String,
}

impl From<GateError> for ErrorEnvelope {
    fn from(err: GateError) -> Self {
        Self {
            code: err.code(),
            msg: err.to_string(),
        }
    }
}
