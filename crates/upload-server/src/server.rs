//! Upload HTTP server.
//!
//! Listens on a TCP port and serves the upload routes until shut down.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use chunkyard_protocol::UploadResponse;
use chunkyard_transfer::UploadScope;

use crate::handler::UploadHandler;
use crate::request::{ChunkBody, client_scope};
use crate::{ApiError, ServerError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Largest accepted request body.
    pub max_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            max_chunk_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Builds the upload router.
pub fn router(handler: Arc<UploadHandler>, max_chunk_bytes: usize) -> Router {
    Router::new()
        .route("/upload/{collection}", post(upload).get(progress))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_chunk_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn upload(
    State(handler): State<Arc<UploadHandler>>,
    Path(collection): Path<String>,
    request: Request,
) -> Result<Json<UploadResponse>, ApiError> {
    let headers = request.headers().clone();
    let scope = UploadScope::new(client_scope(&headers), collection);
    let body = ChunkBody::extract(request).await?;
    let response = handler.handle(&scope, &headers, body).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    file: String,
}

async fn progress(
    State(handler): State<Arc<UploadHandler>>,
    Path(collection): Path<String>,
    Query(query): Query<ProgressQuery>,
    headers: HeaderMap,
) -> Result<Json<UploadResponse>, ApiError> {
    let scope = UploadScope::new(client_scope(&headers), collection);
    Ok(Json(handler.progress(&scope, &query.file).await?))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The upload HTTP server.
pub struct UploadServer {
    config: ServerConfig,
    handler: Arc<UploadHandler>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl UploadServer {
    /// Creates a new server with the given handler.
    pub fn new(config: ServerConfig, handler: UploadHandler) -> Arc<Self> {
        Arc::new(Self {
            config,
            handler: Arc::new(handler),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available while [`run`](Self::run) is serving.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until [`shutdown`](Self::shutdown) is called.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = {
            let mut local_addr = self.local_addr.lock().await;
            if local_addr.is_some() {
                return Err(ServerError::AlreadyRunning);
            }
            let addr = SocketAddr::new(self.config.bind_address, self.config.port);
            let listener = TcpListener::bind(addr).await?;
            *local_addr = Some(listener.local_addr()?);
            listener
        };
        tracing::info!("upload server listening on {}", listener.local_addr()?);

        let app = router(Arc::clone(&self.handler), self.config.max_chunk_bytes);
        let cancel = self.cancel.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;

        *self.local_addr.lock().await = None;
        tracing::info!("server shutting down");
        result.map_err(ServerError::from)
    }
}
