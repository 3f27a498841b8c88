//! Permission authority abstraction.
//!
//! An authority is whatever asks the user "may this origin call this host?".
//! The daemon ships a console implementation; tests plug in a static one.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Outcome of a permission interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The user approved the pairing.
    Allowed,
    /// The user declined, the interaction timed out, or no user was reachable.
    Denied,
}

/// Timing knobs for a single permission interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityTimings {
    /// How long approval stays locked after the prompt appears. Denials are
    /// accepted immediately; approvals only count once this much time has
    /// passed.
    pub ui_wait: Duration,
    /// Hard deadline for the whole interaction. When it elapses without an
    /// unlocked approval the interaction resolves to [`Decision::Denied`].
    pub total_timeout: Duration,
}

impl AuthorityTimings {
    /// Build timings from explicit durations.
    #[must_use]
    pub const fn new(ui_wait: Duration, total_timeout: Duration) -> Self {
        Self {
            ui_wait,
            total_timeout,
        }
    }
}

impl Default for AuthorityTimings {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(20))
    }
}

/// Asks the user whether an (origin, target host) pairing may proceed.
///
/// Implementations must resolve within `timings.total_timeout`; an elapsed
/// deadline is a denial, never an error.
#[async_trait]
pub trait PermissionAuthority: Send + Sync {
    /// Run one permission interaction for the pairing.
    async fn request(
        &self,
        origin: &str,
        target_host: &str,
        timings: AuthorityTimings,
    ) -> Decision;

    /// Short name for log lines.
    fn name(&self) -> &'static str;
}

/// Authority with a fixed answer, optionally delayed.
///
/// Useful for tests and for non-interactive deployments that want a
/// deny-everything (or allow-everything) stance.
#[derive(Debug, Clone, Copy)]
pub struct StaticAuthority {
    decision: Decision,
    delay: Option<Duration>,
}

impl StaticAuthority {
    /// Authority that approves every pairing.
    #[must_use]
    pub const fn allowing() -> Self {
        Self {
            decision: Decision::Allowed,
            delay: None,
        }
    }

    /// Authority that declines every pairing.
    #[must_use]
    pub const fn denying() -> Self {
        Self {
            decision: Decision::Denied,
            delay: None,
        }
    }

    /// Delay the answer, e.g. to simulate a user who takes a while.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl PermissionAuthority for StaticAuthority {
    async fn request(
        &self,
        origin: &str,
        target_host: &str,
        timings: AuthorityTimings,
    ) -> Decision {
        let interaction = async {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.decision
        };
        match tokio::time::timeout(timings.total_timeout, interaction).await {
            Ok(decision) => decision,
            Err(_) => {
                debug!(origin, target_host, "Authority interaction timed out");
                Decision::Denied
            }
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
