//! Console permission prompts.
//!
//! The daemon has no GUI; permission requests are answered on the terminal
//! the daemon was started from. Prompts go to stderr so they stay visible
//! when stdout is redirected.

use std::io::IsTerminal;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};

use super::authority::{AuthorityTimings, Decision, PermissionAuthority};

/// What a line typed at the prompt means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Allow,
    Deny,
}

/// Anything that is not an explicit yes is a no.
fn parse_reply(line: &str) -> Reply {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Reply::Allow,
        _ => Reply::Deny,
    }
}

async fn prompt(origin: &str, target_host: &str, timings: AuthorityTimings) -> std::io::Result<()> {
    let text = format!(
        "\n[corsgate] Permission request\n\
         [corsgate]   origin: {origin}\n\
         [corsgate]   target: {target_host}\n\
         [corsgate] Allow this origin to call the target through the proxy? [y/N]\n\
         [corsgate] (approval unlocks after {}s; request expires after {}s)\n> ",
        timings.ui_wait.as_secs(),
        timings.total_timeout.as_secs(),
    );
    let mut err = tokio::io::stderr();
    err.write_all(text.as_bytes()).await?;
    err.flush().await
}

async fn notice(message: &str) -> std::io::Result<()> {
    let mut err = tokio::io::stderr();
    err.write_all(format!("[corsgate] {message}\n> ").as_bytes())
        .await?;
    err.flush().await
}

/// Authority that asks on the controlling terminal.
///
/// Approval is locked for `ui_wait` after the prompt appears, so a user
/// cannot be tricked into blind-confirming a request that just popped up.
/// Denials are accepted immediately.
///
/// The reply source is generic so tests can drive the prompt loop through an
/// in-memory pipe; the daemon uses [`ConsoleAuthority::new`], which reads
/// stdin.
#[derive(Debug)]
pub struct ConsoleAuthority<R = BufReader<Stdin>> {
    input: Mutex<Lines<R>>,
}

impl ConsoleAuthority {
    #[must_use]
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    /// Whether stdin is attached to a terminal a user could answer on.
    #[must_use]
    pub fn interactive() -> bool {
        std::io::stdin().is_terminal()
    }
}

impl Default for ConsoleAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncBufRead> ConsoleAuthority<R> {
    /// Build an authority that reads replies from `reader` instead of stdin.
    #[must_use]
    pub fn from_reader(reader: R) -> Self {
        Self {
            input: Mutex::new(reader.lines()),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Send + Unpin> PermissionAuthority for ConsoleAuthority<R> {
    async fn request(
        &self,
        origin: &str,
        target_host: &str,
        timings: AuthorityTimings,
    ) -> Decision {
        let deadline = Instant::now() + timings.total_timeout;

        // Prompts queue on the single reader; a request that never reaches
        // the front before its deadline resolves to a denial.
        let Ok(mut lines) = timeout_at(deadline, self.input.lock()).await else {
            return Decision::Denied;
        };

        if prompt(origin, target_host, timings).await.is_err() {
            return Decision::Denied;
        }
        let armed_at = Instant::now() + timings.ui_wait;

        loop {
            let line = match timeout_at(deadline, lines.next_line()).await {
                Ok(Ok(Some(line))) => line,
                // Deadline elapsed, read error, or input closed: nobody said yes.
                Ok(Ok(None) | Err(_)) | Err(_) => return Decision::Denied,
            };
            match parse_reply(&line) {
                Reply::Deny => return Decision::Denied,
                Reply::Allow => {
                    let now = Instant::now();
                    if now >= armed_at {
                        return Decision::Allowed;
                    }
                    let remaining = armed_at.saturating_duration_since(now).as_secs().max(1);
                    let message =
                        format!("approval not unlocked yet; answer again in {remaining}s");
                    if notice(&message).await.is_err() {
                        return Decision::Denied;
                    }
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
