//! Wires the stores, coordinator and HTTP server together.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chunkyard_transfer::{
    CoordinatorConfig, DiskArtifactStore, FsChunkSink, MemoryStateStore, UploadCoordinator,
};
use chunkyard_upload_server::{ServerConfig, UploadHandler, UploadServer};

use crate::config::Config;

/// Runs the server until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let bind_address: IpAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind_address {:?}", config.bind_address))?;

    // -- Stores --
    let sink = FsChunkSink::new(&config.chunk_dir)
        .await
        .with_context(|| format!("cannot prepare chunk_dir {}", config.chunk_dir.display()))?;
    let artifacts = DiskArtifactStore::new(&config.media_root, config.media_url.clone())
        .await
        .with_context(|| format!("cannot prepare media_root {}", config.media_root.display()))?;
    let state = MemoryStateStore::new(state_ttl(config.state_ttl_secs));

    tracing::info!(
        chunk_dir = %sink.root().display(),
        media_root = %artifacts.root().display(),
        state_ttl_secs = config.state_ttl_secs,
        "stores ready"
    );

    let coordinator = UploadCoordinator::new(
        CoordinatorConfig {
            partial_uploads: config.partial_uploads,
        },
        Arc::new(sink),
        Arc::new(state),
        Arc::new(artifacts),
    );

    // -- HTTP server --
    let server_config = ServerConfig {
        bind_address,
        port: config.port,
        max_chunk_bytes: config.max_chunk_bytes,
    };
    let server = UploadServer::new(server_config, UploadHandler::new(Arc::new(coordinator)));
    let server_run = Arc::clone(&server);
    let mut serve = tokio::spawn(async move { server_run.run().await });

    tokio::select! {
        result = &mut serve => {
            // The server stopped on its own: bind failure or I/O error.
            result.context("server task panicked")??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    server.shutdown();
    serve.await.context("server task panicked")??;
    Ok(())
}

/// `0` disables expiry.
fn state_ttl(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
