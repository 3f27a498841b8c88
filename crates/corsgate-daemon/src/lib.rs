//! corsgate Daemon Library
//!
//! Long-running local daemon that gates cross-origin HTTP access behind
//! explicit user permission:
//! - Permission layer: one prompt per (origin, target host) pair, with a
//!   short arming delay before approval is accepted
//! - Proxy layer: relays granted requests to the target host and rewrites
//!   the CORS response headers
//! - HTTP server: the grant endpoint plus the catch-all relay route

pub mod config;
pub mod permission;
pub mod proxy;
pub mod server;
