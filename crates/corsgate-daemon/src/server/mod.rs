//! HTTP frontend: router assembly and serving.

mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::any;
use tokio::net::TcpListener;

use crate::permission::AuthorizationService;
use crate::proxy::ProxyForwarder;

/// Shared handles the handlers work with.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthorizationService>,
    pub forwarder: Arc<ProxyForwarder>,
}

/// Build the two-route application: the grant endpoint plus the relay
/// fallback that swallows every other path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/require_permission", any(routes::require_permission))
        .fallback(routes::relay)
        .with_state(state)
}

/// Serve until the listener fails or the surrounding task is dropped.
///
/// # Errors
///
/// Returns the underlying I/O error when accepting connections fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
