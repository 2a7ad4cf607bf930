use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use super::HttpProbe;
use crate::error::ProbeError;

/// Fixed target of the HTTP latency probe.
pub const HTTP_PROBE_URL: &str = "https://www.google.com";

/// Upper bound for one GET, including connect and TLS handshake.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpProber {
    client: Client,
    url: String,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_url(HTTP_PROBE_URL)
    }

    pub(crate) fn with_url(url: impl Into<String>) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("netgauge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HttpProbe for HttpProber {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get(&self) -> Result<Duration, ProbeError> {
        let start = Instant::now();
        // send() resolves once the response headers are in
        let response = self.client.get(&self.url).send().await?;
        let elapsed = start.elapsed();

        // body is never read; dropping releases the connection
        drop(response);
        Ok(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::exporter::{ProbeMetrics, http_server};

    #[test]
    fn default_target_is_fixed() {
        let prober = HttpProber::new().unwrap();
        assert_eq!(prober.url(), "https://www.google.com");
    }

    #[tokio::test]
    async fn measures_round_trip_against_local_server() {
        let listener = http_server::bind_metrics_listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let metrics = Arc::new(ProbeMetrics::new().unwrap());
        tokio::spawn(http_server::serve_metrics(listener, metrics, shutdown_rx));

        let prober = HttpProber::with_url(format!("http://{}/metrics", addr)).unwrap();
        let rtt = prober.get().await.unwrap();
        assert!(rtt > Duration::ZERO);
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::with_url(format!("http://{}/", addr)).unwrap();
        let err = prober.get().await.unwrap_err();
        assert!(matches!(err, ProbeError::Http(_)));
    }
}
