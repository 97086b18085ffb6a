//! Host-name resolution contract.
//!
//! The link only consumes the contract: given a host string, produce a
//! numeric address or fail. Strings that are already numeric (dotted-quad
//! IPv4, or exactly `::1`) are passed through without a lookup. Resolver
//! results are filtered to IPv4 by policy.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};

use tracing::warn;

/// Resolves a host name to numeric addresses.
///
/// Lookups are blocking, matching the synchronous configuration path
/// they serve. Async callers should wrap them in `spawn_blocking`.
pub trait HostResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system's name service.
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = (host, 0u16).to_socket_addrs()?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Returns `true` if `host` needs no lookup: dotted-quad IPv4 syntax,
/// or exactly `::1`.
pub fn is_numeric_host(host: &str) -> bool {
    host == "::1" || host.parse::<Ipv4Addr>().is_ok()
}

/// Turns a host string into a numeric address.
///
/// Numeric hosts pass through unresolved. Anything else goes through
/// the resolver; the first IPv4 result wins (IPv6 results are excluded
/// by policy). Returns `None` when resolution fails or yields no
/// qualifying address.
pub fn lookup_address(host: &str, resolver: &dyn HostResolver) -> Option<IpAddr> {
    if is_numeric_host(host) {
        if host == "::1" {
            return Some(IpAddr::V6(Ipv6Addr::LOCALHOST));
        }
        return host.parse::<Ipv4Addr>().ok().map(IpAddr::V4);
    }

    match resolver.resolve(host) {
        Ok(addrs) => addrs.into_iter().find(IpAddr::is_ipv4),
        Err(e) => {
            warn!(%host, error = %e, "host lookup failed");
            None
        }
    }
}
