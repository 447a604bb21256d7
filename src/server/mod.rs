//! HTTP server module
//!
//! A hyper HTTP/1.1 accept loop: one tokio task per connection, each request
//! dispatched through [`handlers::handle_request`].

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::auth::{Authenticator, JwtAuthenticator};
use crate::config::Config;
use crate::db::{SqliteVideoStore, StoreError};
use crate::media::FfmpegProcessor;
use crate::storage::{LocalStorage, S3Storage, StorageError};
use crate::upload::{UploadLimits, UploadPipeline};

pub mod handlers;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Record store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// Everything a request handler needs
pub struct AppState {
    pub authenticator: Arc<dyn Authenticator>,
    pub pipeline: UploadPipeline,
    pub assets: LocalStorage,
}

impl AppState {
    /// Wire up the production collaborators from configuration
    pub async fn from_config(config: &Config) -> Result<Self, ServerError> {
        let store = SqliteVideoStore::connect(&config.database.url).await?;
        let assets = LocalStorage::from_config(&config.assets);
        let videos = S3Storage::from_config(&config.s3).await?;

        let limits = UploadLimits {
            max_thumbnail_bytes: config.server.max_thumbnail_bytes,
            max_video_bytes: config.server.max_video_bytes,
        };
        let pipeline = UploadPipeline::new(
            Arc::new(store),
            Arc::new(FfmpegProcessor::from_config(&config.media)),
            Arc::new(assets.clone()),
            Arc::new(videos),
            limits,
            config.server.staging_dir(),
        );

        Ok(Self {
            authenticator: Arc::new(JwtAuthenticator::from_config(&config.auth)),
            pipeline,
            assets,
        })
    }
}

/// HTTP Server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<AppState>,
}

impl Server {
    /// Build the application state from `config` and bind
    pub async fn new(config: &Config) -> Result<Self, ServerError> {
        let state = AppState::from_config(config).await?;
        Self::with_state(&config.server.address, state).await
    }

    /// Bind `address` and serve the given state
    ///
    /// Port 0 lets the OS pick; see [`Server::local_addr`].
    pub async fn with_state(address: &str, state: AppState) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!(address = %local_addr, "Server bound");

        Ok(Self {
            listener,
            local_addr,
            state: Arc::new(state),
        })
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve until `shutdown` completes
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr, "Starting server");
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handlers::handle_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(peer = %peer_addr, error = %e, "Error serving connection");
                }
            });
        }

        info!("Shutting down server");
        Ok(())
    }
}
