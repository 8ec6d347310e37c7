//! HTTP server for the Prometheus scrape endpoint.

use crate::metrics::PrinterMetrics;
use crate::shutdown;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind to address {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The server failed while serving.
    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// Route serving the exposition text.
    pub path: String,
    /// Upper bound on graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8080).into(),
            path: "/metrics".to_string(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl MetricsServerConfig {
    /// Creates a config with a custom port.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
            ..Default::default()
        }
    }
}

/// Builds the scrape router. Reads the registry only.
pub fn router(path: &str, metrics: Arc<PrinterMetrics>) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// HTTP server for exposing Prometheus metrics.
pub struct MetricsServer {
    config: MetricsServerConfig,
    listener: TcpListener,
    metrics: Arc<PrinterMetrics>,
}

impl MetricsServer {
    /// Binds the listening socket.
    ///
    /// Binding is separate from serving so a bind failure aborts startup
    /// before any background work is spawned.
    pub async fn bind(
        config: MetricsServerConfig,
        metrics: Arc<PrinterMetrics>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self {
            config,
            listener,
            metrics,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Server(e.to_string()))
    }

    /// Serves scrapes until shutdown is signalled.
    ///
    /// After the signal, in-flight scrapes get up to `shutdown_timeout`
    /// to complete; past that the server is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let app = router(&self.config.path, self.metrics);

        tracing::info!(
            addr = %self.config.bind_addr,
            path = %self.config.path,
            "Metrics server listening"
        );

        let mut signal = shutdown.clone();
        let server = axum::serve(self.listener, app).with_graceful_shutdown(async move {
            shutdown::cancelled(&mut signal).await;
        });
        let mut handle = tokio::spawn(async move { server.await });

        tokio::select! {
            result = &mut handle => return flatten(result),
            _ = shutdown::cancelled(&mut shutdown) => {}
        }

        tracing::info!(
            timeout_secs = self.config.shutdown_timeout.as_secs(),
            "Metrics server draining"
        );
        drain(handle, self.config.shutdown_timeout).await
    }
}

/// Waits up to `bound` for the serving task to finish, then aborts it.
async fn drain(
    mut handle: JoinHandle<std::io::Result<()>>,
    bound: Duration,
) -> Result<(), ServerError> {
    match tokio::time::timeout(bound, &mut handle).await {
        Ok(result) => {
            tracing::info!("Metrics server closed");
            flatten(result)
        }
        Err(_) => {
            handle.abort();
            tracing::warn!("Metrics server did not drain in time, closed forcibly");
            Ok(())
        }
    }
}

fn flatten(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ServerError::Server(e.to_string())),
        Err(e) => Err(ServerError::Server(e.to_string())),
    }
}

/// Handler for the scrape endpoint.
async fn metrics_handler(State(metrics): State<Arc<PrinterMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tower::ServiceExt;

    fn metrics() -> Arc<PrinterMetrics> {
        Arc::new(PrinterMetrics::new("X1C-0001").unwrap())
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.path, "/metrics");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(9100);
        assert_eq!(config.bind_addr.port(), 9100);
    }

    #[tokio::test]
    async fn test_scrape_returns_registered_metrics() {
        let metrics = metrics();
        metrics.nozzle_temperature.set(215.5);

        let (status, body) = get_body(router("/metrics", metrics), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("bambulab_nozzle_temperature{device=\"X1C-0001\"} 215.5"));
    }

    #[tokio::test]
    async fn test_custom_path_is_served() {
        let (status, _) = get_body(router("/scrape", metrics()), "/scrape").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_body(router("/scrape", metrics()), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = get_body(router("/metrics", metrics()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let config = MetricsServerConfig {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            ..Default::default()
        };
        let server = MetricsServer::bind(config, metrics()).await.unwrap();
        let (tx, rx) = shutdown::channel();

        let handle = tokio::spawn(server.run(rx));
        tx.send(true).unwrap();

        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = MetricsServer::bind(
            MetricsServerConfig {
                bind_addr: ([127, 0, 0, 1], 0).into(),
                ..Default::default()
            },
            metrics(),
        )
        .await
        .unwrap();
        let taken = first.local_addr().unwrap();

        let second = MetricsServer::bind(
            MetricsServerConfig {
                bind_addr: taken,
                ..Default::default()
            },
            metrics(),
        )
        .await;

        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_in_flight_scrape_completes_after_shutdown() {
        let config = MetricsServerConfig {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            ..Default::default()
        };
        let server = MetricsServer::bind(config, metrics()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = shutdown::channel();
        let handle = tokio::spawn(server.run(rx));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /metrics HTTP/1.1\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream
            .write_all(b"Host: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("bambulab_prints_total"));

        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_forces_close_after_bound() {
        let stuck = tokio::spawn(std::future::pending::<std::io::Result<()>>());
        let started = tokio::time::Instant::now();

        assert!(drain(stuck, Duration::from_secs(5)).await.is_ok());

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_returns_when_server_finishes_first() {
        let finishing = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(())
        });
        let started = tokio::time::Instant::now();

        assert!(drain(finishing, Duration::from_secs(5)).await.is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_drain_reports_server_failure() {
        let failed = tokio::spawn(async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "accept failed"))
        });

        assert!(matches!(
            drain(failed, Duration::from_secs(5)).await,
            Err(ServerError::Server(_))
        ));
    }
}
