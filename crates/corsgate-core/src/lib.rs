//! corsgate Core Library
//!
//! Shared functionality for corsgate components:
//! - In-memory session store with grant deduplication
//! - Wire-level error codes and the JSON error envelope
//! - Tracing/logging initialization

pub mod error;
pub mod session;
pub mod tracing_init;

pub use error::{ErrorEnvelope, GateError};
pub use session::{GrantKey, Session, SessionStore};
