mod http;
mod icmp;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProbeError;

pub use http::{HTTP_PROBE_URL, HttpProber};
pub use icmp::{IcmpMode, IcmpProber};
#[cfg(test)]
pub use icmp::ICMP_TIMEOUT;

/// Sends one ICMP echo to a host and reports the round trip.
#[async_trait]
pub trait IcmpProbe: Send + Sync {
    async fn ping(&self, host: &str) -> Result<Duration, ProbeError>;
}

/// Issues one HTTP GET and reports the time until the response headers arrived.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    fn url(&self) -> &str;

    async fn get(&self) -> Result<Duration, ProbeError>;
}

/// Outcome of one probe cycle, flattened into gauge values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeResult {
    pub icmp_success: bool,
    pub icmp_rtt_ms: f64,
    pub http_rtt_ms: f64,
}

impl ProbeResult {
    /// Builds a result from the two raw probe outcomes.
    ///
    /// Failed probes contribute a round trip of 0, so `icmp_rtt_ms` is 0 whenever
    /// `icmp_success` is false.
    pub fn from_outcomes(
        icmp: &Result<Duration, ProbeError>,
        http: &Result<Duration, ProbeError>,
    ) -> Self {
        let (icmp_success, icmp_rtt_ms) = match icmp {
            Ok(rtt) => (true, duration_to_ms(*rtt)),
            Err(_) => (false, 0.0),
        };
        let http_rtt_ms = match http {
            Ok(rtt) => duration_to_ms(*rtt),
            Err(_) => 0.0,
        };

        Self {
            icmp_success,
            icmp_rtt_ms,
            http_rtt_ms,
        }
    }
}

/// Converts a duration to milliseconds rounded to 2 decimal places.
pub fn duration_to_ms(duration: Duration) -> f64 {
    round_ms(duration.as_secs_f64() * 1000.0)
}

/// Rounds a millisecond value to 2 decimal places, halves away from zero.
pub fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}
