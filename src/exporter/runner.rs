use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::exporter::ProbeMetrics;
use crate::probe::{HttpProbe, IcmpProbe, ProbeResult};

/// Runs ICMP and HTTP probes one after the other and records the results.
pub struct ProbeLoop<I, H> {
    host: String,
    interval: Duration,
    icmp: I,
    http: H,
    metrics: Arc<ProbeMetrics>,
}

impl<I: IcmpProbe + 'static, H: HttpProbe + 'static> ProbeLoop<I, H> {
    pub fn new(host: String, interval: Duration, icmp: I, http: H, metrics: Arc<ProbeMetrics>) -> Self {
        Self {
            host,
            interval,
            icmp,
            http,
            metrics,
        }
    }

    /// Runs one cycle: ICMP probe, then HTTP probe, then a gauge update.
    ///
    /// A failed ICMP probe never skips the HTTP probe.
    pub async fn run_cycle(&self) -> ProbeResult {
        let icmp = self.icmp.ping(&self.host).await;
        if let Err(err) = &icmp {
            tracing::warn!(host = %self.host, error = %err, "ICMP probe failed");
        }

        let http = self.http.get().await;
        if let Err(err) = &http {
            tracing::warn!(url = %self.http.url(), error = %err, "HTTP GET error");
        }

        let result = ProbeResult::from_outcomes(&icmp, &http);
        self.metrics.record(&result);

        if result.icmp_success {
            tracing::info!("Ping to {}: {:.2} ms", self.host, result.icmp_rtt_ms);
        } else {
            tracing::info!("Ping to {} failed", self.host);
        }
        if http.is_ok() {
            tracing::info!("HTTP GET to {} took {:.2} ms", self.http.url(), result.http_rtt_ms);
        }

        result
    }

    /// Repeats cycles, sleeping `interval` after each, until `running` is cleared.
    pub async fn run(self, running: Arc<AtomicBool>) {
        while running.load(Ordering::Relaxed) {
            self.run_cycle().await;
            tokio::time::sleep(self.interval).await;
        }
        tracing::info!("Probe loop stopped");
    }
}

/// Spawns the probe loop on its own task
pub fn spawn_probe_loop<I, H>(probe_loop: ProbeLoop<I, H>, running: Arc<AtomicBool>) -> JoinHandle<()>
where
    I: IcmpProbe + 'static,
    H: HttpProbe + 'static,
{
    tokio::spawn(probe_loop.run(running))
}
