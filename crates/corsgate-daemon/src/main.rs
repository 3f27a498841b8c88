//! corsgate daemon binary.
//!
//! Binds the local HTTP listener, answers permission prompts on the
//! controlling terminal, and runs until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use corsgate_core::SessionStore;
use corsgate_core::tracing_init::init_tracing;
use corsgate_daemon::config::DaemonConfig;
use corsgate_daemon::permission::{
    AuthorityTimings, AuthorizationService, ConsoleAuthority, PermissionAuthority, StaticAuthority,
};
use corsgate_daemon::proxy::ProxyForwarder;
use corsgate_daemon::server::{self, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "corsgate-daemon", version, about = "Permission-gated local CORS proxy")]
struct Args {
    /// Address to bind the HTTP listener.
    #[arg(long, env = "CORSGATE_ADDR", default_value = "127.0.0.1:11451")]
    addr: SocketAddr,

    /// Seconds before the Allow answer unlocks in the prompt.
    #[arg(long, env = "CORSGATE_UI_WAIT", default_value_t = 5)]
    ui_wait: u64,

    /// Seconds until an unanswered prompt resolves to a denial.
    #[arg(long, env = "CORSGATE_PROMPT_TIMEOUT", default_value_t = 20)]
    prompt_timeout: u64,

    /// Seconds allowed for one outbound request to a target host.
    #[arg(long, env = "CORSGATE_UPSTREAM_TIMEOUT", default_value_t = 30)]
    upstream_timeout: u64,

    /// Log level when RUST_LOG is not set.
    #[arg(long, env = "CORSGATE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, env = "CORSGATE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(
        &format!(
            "corsgate_daemon={level},corsgate_core={level}",
            level = args.log_level
        ),
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting corsgate daemon"
    );

    let config = DaemonConfig::bind(args.addr)
        .with_timings(AuthorityTimings::new(
            Duration::from_secs(args.ui_wait),
            Duration::from_secs(args.prompt_timeout),
        ))
        .with_upstream_timeout(Duration::from_secs(args.upstream_timeout));

    let authority: Arc<dyn PermissionAuthority> = if ConsoleAuthority::interactive() {
        Arc::new(ConsoleAuthority::new())
    } else {
        warn!("stdin is not a terminal; permission requests will be denied");
        Arc::new(StaticAuthority::denying())
    };

    let store = Arc::new(SessionStore::new());
    let auth = Arc::new(AuthorizationService::new(
        store.clone(),
        authority,
        config.timings,
    ));
    let forwarder = Arc::new(ProxyForwarder::new(store, config.upstream_timeout)?);
    let state = AppState { auth, forwarder };

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "HTTP listener ready");

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        result = server::serve(listener, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    info!("Daemon stopped");
    Ok(())
}
