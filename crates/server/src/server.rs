use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use std::{path::Path, sync::Arc};

use crate::data;
use engine::LedgerCache;

#[derive(Clone)]
pub struct ServerState {
    pub cache: Arc<LedgerCache>,
}

/// `GET /data` plus the static UI for every other path.
pub fn router(cache: Arc<LedgerCache>, static_dir: impl AsRef<Path>) -> Router {
    let state = ServerState { cache };

    Router::new()
        .route("/data", get(data::get))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .with_state(state)
}

/// Serves until `shutdown` is cancelled, then drains open connections.
pub async fn run_with_listener(
    cache: Arc<LedgerCache>,
    static_dir: impl AsRef<Path>,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(cache, static_dir))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
