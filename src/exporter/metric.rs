use prometheus::{Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::probe::ProbeResult;

/// Gauges holding the outcome of the most recent probe cycle
#[derive(Debug, Clone)]
pub struct ProbeMetrics {
    /// 1 if the last ping got a reply, 0 otherwise
    icmp_success: Gauge,
    /// Last ICMP round trip in milliseconds
    icmp_response_time: Gauge,
    /// Last HTTP GET round trip in milliseconds
    http_response_time: Gauge,
    /// Prometheus registry, holds only the gauges above
    registry: Arc<Registry>,
}

impl ProbeMetrics {
    /// Creates the gauges and registers them in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let icmp_success = Gauge::with_opts(Opts::new(
            "icmp_ping_success",
            "1 if the last ping was successful, 0 if it failed.",
        ))?;
        let icmp_response_time = Gauge::with_opts(Opts::new(
            "icmp_ping_response_time",
            "Response time of the last ICMP ping in milliseconds.",
        ))?;
        let http_response_time = Gauge::with_opts(Opts::new(
            "http_response_time",
            "Response time of the last HTTP GET request in milliseconds.",
        ))?;

        registry.register(Box::new(icmp_success.clone()))?;
        registry.register(Box::new(icmp_response_time.clone()))?;
        registry.register(Box::new(http_response_time.clone()))?;

        Ok(Self {
            icmp_success,
            icmp_response_time,
            http_response_time,
            registry,
        })
    }

    /// Overwrites all three gauges with the result of one cycle
    pub fn record(&self, result: &ProbeResult) {
        self.icmp_success
            .set(if result.icmp_success { 1.0 } else { 0.0 });
        self.icmp_response_time.set(result.icmp_rtt_ms);
        self.http_response_time.set(result.http_rtt_ms);
    }

    /// Current gauge values as a `ProbeResult`
    #[cfg(test)]
    pub fn snapshot(&self) -> ProbeResult {
        ProbeResult {
            icmp_success: self.icmp_success.get() == 1.0,
            icmp_rtt_ms: self.icmp_response_time.get(),
            http_rtt_ms: self.http_response_time.get(),
        }
    }

    /// Gets metrics data in Prometheus format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        encoder.encode_to_string(&metric_families).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Error encoding metrics");
            String::new()
        })
    }
}

/// HTTP server to expose /metrics endpoint
pub mod http_server {
    use super::*;
    use hyper::service::service_fn;
    use hyper::{Method, Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use hyper_util::server::conn::auto::Builder;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Binds the metrics listener.
    ///
    /// Done before any probing starts so a taken port aborts startup.
    pub async fn bind_metrics_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
        TcpListener::bind(addr).await
    }

    /// Serves scrape requests until the shutdown signal fires
    pub async fn serve_metrics(
        listener: TcpListener,
        metrics: Arc<ProbeMetrics>,
        mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                // Accept new connections
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            let metrics = metrics.clone();

                            tokio::task::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    handle_request(req, metrics.clone())
                                });

                                if let Err(err) = Builder::new(hyper_util::rt::TokioExecutor::new())
                                    .serve_connection(io, service)
                                    .await
                                {
                                    tracing::error!(error = ?err, "Error serving connection");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                // Receive shutdown signal
                _ = &mut shutdown_rx => {
                    tracing::info!("Metrics server shutting down gracefully");
                    break;
                }
            }
        }
    }

    /// Handles HTTP requests
    async fn handle_request(
        req: Request<hyper::body::Incoming>,
        metrics: Arc<ProbeMetrics>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let (status, content_type, body) = match (req.method(), req.uri().path()) {
            (&Method::GET, "/metrics") => (
                StatusCode::OK,
                "text/plain; version=0.0.4; charset=utf-8",
                Bytes::from(metrics.gather()),
            ),
            (&Method::GET, "/") => (
                StatusCode::OK,
                "text/html",
                Bytes::from_static(INDEX_PAGE.as_bytes()),
            ),
            _ => (
                StatusCode::NOT_FOUND,
                "text/plain; charset=utf-8",
                Bytes::from_static(b"Not Found"),
            ),
        };

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static(content_type),
        );
        Ok(response)
    }

    const INDEX_PAGE: &str = r#"<html>
<head><title>netgauge</title></head>
<body>
<h1>netgauge</h1>
<p><a href='/metrics'>Metrics</a></p>
</body>
</html>"#;
}
