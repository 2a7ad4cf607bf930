mod error;
mod exporter;
mod network;
mod probe;

use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::{runtime::Builder, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::exporter::{ProbeLoop, ProbeMetrics, http_server, spawn_probe_loop};
use crate::probe::{HTTP_PROBE_URL, HttpProber, IcmpMode, IcmpProber};

/// Shortest allowed pause between probe cycles
const MIN_INTERVAL_SECS: u64 = 1;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "netgauge - ICMP and HTTP health probe exposing Prometheus gauges"
)]
struct Args {
    /// Target host for ICMP ping
    #[arg(long, default_value = "google.com", env = "NETGAUGE_HOST")]
    host: String,

    /// Port for Prometheus metrics server
    #[arg(long, default_value_t = 8080, env = "NETGAUGE_PORT")]
    port: u16,

    /// Interval in seconds between probe cycles
    #[arg(short, long, default_value_t = 5, help = "Interval in seconds between probe cycles")]
    interval: u64,

    /// How ICMP echo requests are sent
    #[arg(long = "icmp-mode", value_enum, default_value_t = IcmpMode::Raw)]
    icmp_mode: IcmpMode,

    #[clap(long = "force-ipv6", default_value_t = false, short = '6', help = "Force using IPv6")]
    force_ipv6: bool,
}

impl Args {
    fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(MIN_INTERVAL_SECS))
    }
}

fn main() -> anyhow::Result<()> {
    // parse command line arguments
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,netgauge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // one worker for the probe loop, one for the metrics server
    let rt = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let res = rt.block_on(run_exporter(args));

    // if error print error message and exit
    if let Err(err) = res {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_exporter(args: Args) -> anyhow::Result<()> {
    let metrics = Arc::new(ProbeMetrics::new()?);

    // Bind first: a taken port must stop the process before any probing
    let metrics_addr = args.metrics_addr();
    let listener = http_server::bind_metrics_listener(metrics_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind metrics server on {}: {}", metrics_addr, e))?;

    // Create signal handling channel
    let running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    // Setup signal handling
    let running_for_signal = running.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, shutting down gracefully...");
                running_for_signal.store(false, Ordering::Relaxed);

                // Send shutdown signal to HTTP server
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                tracing::error!(error = %err, "Unable to listen for shutdown signal");
            }
        }
    });

    let icmp = IcmpProber::new(args.icmp_mode, args.force_ipv6);

    println!("netgauge exporter started");
    println!("  ICMP target : {} ({} mode)", args.host, icmp.mode());
    println!("  HTTP target : {}", HTTP_PROBE_URL);
    println!("  Interval    : {} seconds", args.interval().as_secs());
    println!("  Metrics     : http://{}/metrics", metrics_addr);
    println!("  Actions     : Press Ctrl+C to stop");

    let metrics_for_server = metrics.clone();
    let server_task = tokio::spawn(http_server::serve_metrics(
        listener,
        metrics_for_server,
        shutdown_rx,
    ));

    let probe_loop = ProbeLoop::new(
        args.host.clone(),
        args.interval(),
        icmp,
        HttpProber::new()?,
        metrics.clone(),
    );
    let probe_task = spawn_probe_loop(probe_loop, running.clone());

    // Wait for metrics server to shut down
    server_task.await?;

    running.store(false, Ordering::Relaxed);
    probe_task.await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_flags() {
        let args = Args::try_parse_from(["netgauge"]).unwrap();
        assert_eq!(args.host, "google.com");
        assert_eq!(args.metrics_addr().port(), 8080);
        assert_eq!(args.interval(), Duration::from_secs(5));
        assert_eq!(args.icmp_mode, IcmpMode::Raw);
        assert!(!args.force_ipv6);
    }

    #[test]
    fn port_flag_moves_metrics_endpoint() {
        let args = Args::try_parse_from(["netgauge", "--port", "9999", "--host", "1.1.1.1"]).unwrap();
        let addr = args.metrics_addr();
        assert_eq!(addr.port(), 9999);
        assert_ne!(addr.port(), 8080);
        assert_eq!(args.host, "1.1.1.1");
    }

    #[test]
    fn interval_is_clamped() {
        let args = Args::try_parse_from(["netgauge", "--interval", "0"]).unwrap();
        assert_eq!(args.interval(), Duration::from_secs(1));
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Args::try_parse_from(["netgauge", "--port", "http"]).is_err());
        assert!(Args::try_parse_from(["netgauge", "--icmp-mode", "tcp"]).is_err());
    }

    #[tokio::test]
    async fn custom_port_serves_metrics() {
        // bind on a free loopback port the same way main wires --port
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let args = Args::try_parse_from(["netgauge", "--port", &port.to_string()]).unwrap();
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, args.metrics_addr().port()));
        let listener = http_server::bind_metrics_listener(addr).await.unwrap();
        let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let metrics = Arc::new(ProbeMetrics::new().unwrap());
        tokio::spawn(http_server::serve_metrics(listener, metrics, shutdown_rx));

        let body = reqwest::get(format!("http://127.0.0.1:{}/metrics", port))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("icmp_ping_success"));

        // nothing answers on the default port
        let default_port = Args::try_parse_from(["netgauge"]).unwrap().metrics_addr().port();
        assert!(
            tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, default_port))
                .await
                .is_err()
        );
    }
}
