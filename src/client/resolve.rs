//! Host name resolution for `connect`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::lookup_host;

use super::client::ClientError;

/// Resolve `host:port` to one socket address.
///
/// IP literals are used as is and `localhost` maps to the IPv4 loopback.
/// Anything else goes through the system resolver and the first result wins.
pub async fn resolve_host(host: &str, port: u16) -> Result<SocketAddr, ClientError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }

    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|err| ClientError::Resolve(format!("{host}: {err}")))?;
    addrs
        .next()
        .ok_or_else(|| ClientError::Resolve(format!("{host}: no addresses")))
}
