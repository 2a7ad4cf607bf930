use std::net::IpAddr;

use crate::error::ProbeError;

// get host ip address default to ipv4
pub(crate) async fn resolve_host_ip(host: &str, force_ipv6: bool) -> Result<IpAddr, ProbeError> {
    // literal addresses skip the resolver
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let ipaddr: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|source| ProbeError::Resolve {
            host: host.to_string(),
            source,
        })?
        .map(|s| s.ip())
        .collect();

    pick_address(host, ipaddr, force_ipv6)
}

// filter ipv4 or ipv6
fn pick_address(host: &str, ips: Vec<IpAddr>, force_ipv6: bool) -> Result<IpAddr, ProbeError> {
    ips.into_iter()
        .find(|ip| if force_ipv6 { ip.is_ipv6() } else { ip.is_ipv4() })
        .ok_or_else(|| ProbeError::NoAddress {
            host: host.to_string(),
            family: if force_ipv6 { "IPv6" } else { "IPv4" },
        })
}
