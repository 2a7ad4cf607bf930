use std::net::IpAddr;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clap::ValueEnum;
use pinger::{ping, PingOptions, PingResult};
use socket2::Type;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tokio::time::timeout;

use super::IcmpProbe;
use crate::error::ProbeError;
use crate::network::resolve_host_ip;

/// How long a single echo request waits for its reply.
pub const ICMP_TIMEOUT: Duration = Duration::from_secs(2);

// same payload size as the classic `ping` default
const PAYLOAD: [u8; 56] = [0; 56];

/// How the ICMP echo is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IcmpMode {
    /// Raw ICMP socket, needs root or CAP_NET_RAW
    Raw,
    /// Unprivileged datagram ICMP socket
    Dgram,
    /// Platform `ping` binary
    System,
}

impl std::fmt::Display for IcmpMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IcmpMode::Raw => "raw",
            IcmpMode::Dgram => "dgram",
            IcmpMode::System => "system",
        };
        f.write_str(name)
    }
}

/// Single-packet ICMP prober.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    mode: IcmpMode,
    timeout: Duration,
    force_ipv6: bool,
}

impl IcmpProber {
    pub fn new(mode: IcmpMode, force_ipv6: bool) -> Self {
        Self {
            mode,
            timeout: ICMP_TIMEOUT,
            force_ipv6,
        }
    }

    pub fn mode(&self) -> IcmpMode {
        self.mode
    }

    async fn socket_ping(&self, ip: IpAddr, sock_type: Type) -> Result<Duration, ProbeError> {
        let kind = if ip.is_ipv6() { ICMP::V6 } else { ICMP::V4 };
        let config = Config::builder().kind(kind).sock_type_hint(sock_type).build();
        let client = Client::new(&config).map_err(ProbeError::from_socket)?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        match timeout(self.timeout, pinger.ping(PingSequence(0), &PAYLOAD)).await {
            Ok(Ok((_packet, rtt))) => Ok(rtt),
            Ok(Err(SurgeError::Timeout { .. })) | Err(_) => Err(ProbeError::Timeout(self.timeout)),
            Ok(Err(err)) => Err(ProbeError::Icmp(err.to_string())),
        }
    }

    async fn system_ping(&self, ip: IpAddr) -> Result<Duration, ProbeError> {
        let wait = self.timeout;
        tokio::task::spawn_blocking(move || system_ping_blocking(ip, wait))
            .await
            .map_err(|err| ProbeError::Icmp(format!("ping worker failed: {}", err)))?
    }
}

#[async_trait]
impl IcmpProbe for IcmpProber {
    async fn ping(&self, host: &str) -> Result<Duration, ProbeError> {
        let ip = resolve_host_ip(host, self.force_ipv6).await?;
        match self.mode {
            IcmpMode::Raw => self.socket_ping(ip, Type::RAW).await,
            IcmpMode::Dgram => self.socket_ping(ip, Type::DGRAM).await,
            IcmpMode::System => self.system_ping(ip).await,
        }
    }
}

// one echo, and the child gives up on its own after `wait`
fn one_shot_arguments(wait: Duration) -> Vec<String> {
    let secs = wait.as_secs().max(1);
    if cfg!(windows) {
        vec!["-n".to_string(), "1".to_string(), "-w".to_string(), (secs * 1000).to_string()]
    } else if cfg!(any(target_os = "macos", target_os = "freebsd")) {
        vec!["-c1".to_string(), format!("-t{}", secs)]
    } else {
        vec!["-c1".to_string(), format!("-W{}", secs)]
    }
}

// waits for the reply of a single-echo `ping` child process, bounded by `wait`
fn system_ping_blocking(ip: IpAddr, wait: Duration) -> Result<Duration, ProbeError> {
    let options =
        PingOptions::new(ip.to_string(), wait, None).with_raw_arguments(one_shot_arguments(wait));
    let stream = ping(options).map_err(|err| ProbeError::Icmp(format!("ping init failed: {}", err)))?;

    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match stream.recv_timeout(remaining) {
            Ok(PingResult::Pong(duration, _line)) => return Ok(duration),
            Ok(PingResult::Timeout(_)) => return Err(ProbeError::Timeout(wait)),
            Ok(PingResult::PingExited(status, err)) => {
                return Err(ProbeError::PingExited(format!("status: {} err: {}", status, err)));
            }
            Ok(PingResult::Unknown(msg)) => {
                tracing::debug!(%ip, line = %msg, "ignoring unparsed ping output");
            }
            Err(RecvTimeoutError::Timeout) => return Err(ProbeError::Timeout(wait)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ProbeError::PingExited("ping output closed".to_string()));
            }
        }
    }
}
