//! Proxy layer: header rewriting and relaying to target hosts.

mod forwarder;
mod headers;

pub use forwarder::{ForwardError, ForwardReply, ProxiedResponse, ProxyForwarder};
pub use headers::{CONTROL_HEADER_PREFIX, REMOVE_HEADERS_DIRECTIVE};
