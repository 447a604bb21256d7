//! Prometheus scrape endpoint
//!
//! `GET /metrics` and `GET /health` on their own port, separate from the
//! upload listener.
//!
//! ```no_run
//! use tsukumo::metrics::server::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("127.0.0.1:9090");
//! let addr = server.start().await?;
//! println!("Scrape http://{}/metrics", addr);
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::MetricsConfig;

/// Metrics server errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("Failed to bind metrics listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Background scrape listener, stopped by [`MetricsServer::shutdown`]
pub struct MetricsServer {
    address: String,
    running: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl MetricsServer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            running: None,
        }
    }

    /// Listen on all interfaces at `metrics.port`
    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(format!("0.0.0.0:{}", config.port))
    }

    /// Bind and start serving in a background task
    ///
    /// Returns the bound address, which differs from the configured one when
    /// the port is 0.
    pub async fn start(&mut self) -> Result<SocketAddr, MetricsServerError> {
        let bind_error = |source| MetricsServerError::Bind {
            address: self.address.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.address).await.map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(accept_loop(listener, shutdown_rx));
        self.running = Some((shutdown_tx, handle));

        tracing::debug!(address = %addr, "Metrics listener bound");
        Ok(addr)
    }

    /// Stop accepting and wait for the accept loop to exit
    pub async fn shutdown(&mut self) {
        if let Some((shutdown_tx, handle)) = self.running.take() {
            let _ = shutdown_tx.send(());
            let _ = handle.await;
        }
    }
}

async fn accept_loop(listener: TcpListener, mut shutdown_rx: oneshot::Receiver<()>) {
    loop {
        let stream = tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics accept failed");
                    continue;
                }
            },
        };

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service_fn(scrape))
                .await
            {
                tracing::debug!(error = %e, "Metrics connection error");
            }
        });
    }
}

async fn scrape(req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        return Ok(respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed"));
    }

    let response = match req.uri().path() {
        "/metrics" => {
            let encoder = TextEncoder::new();
            let mut buffer = Vec::new();
            match encoder.encode(&prometheus::gather(), &mut buffer) {
                Ok(()) => respond(StatusCode::OK, encoder.format_type(), buffer),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode metrics");
                    respond(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "text/plain",
                        "Failed to encode metrics",
                    )
                }
            }
        }
        "/health" => respond(StatusCode::OK, "text/plain", "ok"),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    };
    Ok(response)
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
