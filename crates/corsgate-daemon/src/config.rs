//! Daemon configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::permission::AuthorityTimings;

/// Runtime knobs for the daemon; defaults match the stock deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Address the HTTP listener binds.
    pub bind_addr: SocketAddr,
    /// Permission prompt windows.
    pub timings: AuthorityTimings,
    /// Hard per-request timeout towards target hosts.
    pub upstream_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 11451),
            timings: AuthorityTimings::default(),
            upstream_timeout: Duration::from_secs(30),
        }
    }
}

impl DaemonConfig {
    /// Config listening on `addr` with stock timings.
    #[must_use]
    pub fn bind(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_timings(mut self, timings: AuthorityTimings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub const fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }
}
