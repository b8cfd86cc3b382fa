//! Simulator endpoint resolution and display.
//!
//! Lookups always prefer the first IPv6 candidate over the first IPv4
//! candidate, for named hosts and for the wildcard alike. Without this the
//! Linux resolver hands back V6,V4 for a named host but V4,V6 for the
//! wildcard, and consumers end up bound to different families depending on
//! whether a host was given.

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::fmt::{self, Write};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Longest textual IPv6 literal (`ffff:...:255.255.255.255`).
pub const MAX_IPV6_TEXT_LEN: usize = 45;

/// Minimum buffer accepted by [`format_address_into`]: literal, brackets,
/// colon, five port digits and a terminator slot.
pub const ADDRESS_TEXT_MIN_LEN: usize = MAX_IPV6_TEXT_LEN + 2 + 1 + 5 + 1;

const_assert!(ADDRESS_TEXT_MIN_LEN > "[ffff:ffff:ffff:ffff:ffff:ffff:255.255.255.255]:65535".len());

pub type AddressText = ArrayString<ADDRESS_TEXT_MIN_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketKind {
    /// TCP
    Stream,
    /// UDP
    Datagram,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("address buffer too small: need {needed} bytes, got {provided}")]
    BufferTooSmall { needed: usize, provided: usize },
}

/// A concrete endpoint for one connect or bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    addr: SocketAddr,
    kind: SocketKind,
}

impl ResolvedAddress {
    pub fn new(addr: SocketAddr, kind: SocketKind) -> Self {
        Self { addr, kind }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }

    /// Wildcard address of the same family, used to bind the local end of
    /// a datagram socket before connecting it.
    pub fn local_wildcard(&self) -> SocketAddr {
        match self.addr {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        }
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_address(&self.addr))
    }
}

/// Source of candidate addresses. `host == None` requests the wildcard.
pub trait HostLookup {
    fn lookup(&self, host: Option<&str>, port: u16, kind: SocketKind) -> io::Result<Vec<SocketAddr>>;
}

/// The operating system resolver.
///
/// IPv6 candidates, named or wildcard, are only offered when the host can
/// actually open an IPv6 socket, so an IPv4-only stack never gets handed an
/// unusable family. The socket kind does not narrow the lookup; std's
/// resolver yields the same addresses for stream and datagram sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl HostLookup for SystemLookup {
    fn lookup(&self, host: Option<&str>, port: u16, _kind: SocketKind) -> io::Result<Vec<SocketAddr>> {
        let candidates: Vec<SocketAddr> = match host {
            Some(name) => (name, port).to_socket_addrs()?.collect(),
            None => vec![
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
            ],
        };
        Ok(configured_families(candidates, ipv6_configured()))
    }
}

/// Drop IPv6 candidates when the host has no usable IPv6 stack. Order of
/// the remaining candidates is kept.
pub fn configured_families(mut candidates: Vec<SocketAddr>, ipv6_available: bool) -> Vec<SocketAddr> {
    if !ipv6_available {
        candidates.retain(SocketAddr::is_ipv4);
    }
    candidates
}

fn ipv6_configured() -> bool {
    UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).is_ok()
}

/// Resolve through the system resolver.
pub fn resolve(host: Option<&str>, port: u16, kind: SocketKind) -> Result<ResolvedAddress, AddressError> {
    resolve_with(&SystemLookup, host, port, kind)
}

pub fn resolve_with<L: HostLookup + ?Sized>(
    lookup: &L,
    host: Option<&str>,
    port: u16,
    kind: SocketKind,
) -> Result<ResolvedAddress, AddressError> {
    let candidates = lookup
        .lookup(host, port, kind)
        .map_err(|e| AddressError::ResolutionFailed(e.to_string()))?;

    debug!(
        host = host.unwrap_or("*"),
        port,
        candidates = candidates.len(),
        "address lookup"
    );

    select_preferred(&candidates)
        .map(|addr| ResolvedAddress::new(addr, kind))
        .ok_or_else(|| {
            AddressError::ResolutionFailed(format!(
                "no IPv4 or IPv6 address for {}:{}",
                host.unwrap_or("*"),
                port
            ))
        })
}

/// First IPv6 candidate if any, else first IPv4 candidate.
pub fn select_preferred(candidates: &[SocketAddr]) -> Option<SocketAddr> {
    let v6 = candidates.iter().find(|a| a.is_ipv6());
    let v4 = candidates.iter().find(|a| a.is_ipv4());
    v6.or(v4).copied()
}

/// Render `addr:port`, bracketing IPv6 literals as in a URI authority.
pub fn format_address(addr: &SocketAddr) -> AddressText {
    let mut text = AddressText::new();
    let written = match addr {
        SocketAddr::V4(v4) => write!(text, "{}:{}", v4.ip(), v4.port()),
        SocketAddr::V6(v6) => write!(text, "[{}]:{}", v6.ip(), v6.port()),
    };
    debug_assert!(written.is_ok(), "address text capacity exceeded");
    text
}

/// Render into a caller-supplied buffer. Buffers smaller than
/// [`ADDRESS_TEXT_MIN_LEN`] are refused rather than truncated.
pub fn format_address_into<'a, const N: usize>(
    addr: &SocketAddr,
    out: &'a mut ArrayString<N>,
) -> Result<&'a str, AddressError> {
    if N < ADDRESS_TEXT_MIN_LEN {
        return Err(AddressError::BufferTooSmall {
            needed: ADDRESS_TEXT_MIN_LEN,
            provided: N,
        });
    }

    out.clear();
    out.try_push_str(&format_address(addr))
        .map_err(|_| AddressError::BufferTooSmall {
            needed: ADDRESS_TEXT_MIN_LEN,
            provided: N,
        })?;
    Ok(out.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Vec<SocketAddr>);

    impl HostLookup for FixedLookup {
        fn lookup(&self, _host: Option<&str>, _port: u16, _kind: SocketKind) -> io::Result<Vec<SocketAddr>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_prefers_first_of_each_family() {
        let candidates: Vec<SocketAddr> = vec![
            "10.0.0.1:80".parse().unwrap(),
            "[fd00::1]:80".parse().unwrap(),
            "10.0.0.2:80".parse().unwrap(),
            "[fd00::2]:80".parse().unwrap(),
        ];
        assert_eq!(select_preferred(&candidates), Some("[fd00::1]:80".parse().unwrap()));
        assert_eq!(select_preferred(&candidates[..1]), Some("10.0.0.1:80".parse().unwrap()));
        assert_eq!(select_preferred(&[]), None);
    }

    #[test]
    fn test_ipv6_dropped_without_ipv6_stack() {
        let candidates: Vec<SocketAddr> = vec![
            "[::1]:18083".parse().unwrap(),
            "127.0.0.1:18083".parse().unwrap(),
            "[fd00::2]:18083".parse().unwrap(),
            "10.0.0.2:18083".parse().unwrap(),
        ];

        let v4_only = configured_families(candidates.clone(), false);
        assert_eq!(
            v4_only,
            vec![
                "127.0.0.1:18083".parse::<SocketAddr>().unwrap(),
                "10.0.0.2:18083".parse().unwrap()
            ]
        );
        assert_eq!(select_preferred(&v4_only), Some("127.0.0.1:18083".parse().unwrap()));

        assert_eq!(configured_families(candidates.clone(), true), candidates);
    }

    #[test]
    fn test_localhost_as_ipv6_on_ipv4_only_host() {
        let lookup = FixedLookup(configured_families(
            vec!["[::1]:49000".parse().unwrap(), "127.0.0.1:49000".parse().unwrap()],
            false,
        ));
        let resolved = resolve_with(&lookup, Some("localhost"), 49000, SocketKind::Datagram).unwrap();
        assert_eq!(resolved.to_string(), "127.0.0.1:49000");
    }

    #[test]
    fn test_no_candidates_left_after_filtering() {
        let only_v6 = configured_families(vec!["[::1]:1".parse().unwrap()], false);
        assert!(only_v6.is_empty());
        let err = resolve_with(&FixedLookup(only_v6), Some("v6only"), 1, SocketKind::Stream).unwrap_err();
        assert!(matches!(err, AddressError::ResolutionFailed(_)));
    }

    #[test]
    fn test_empty_lookup_is_resolution_failure() {
        let err = resolve_with(&FixedLookup(Vec::new()), Some("nowhere"), 1, SocketKind::Stream).unwrap_err();
        assert!(matches!(err, AddressError::ResolutionFailed(_)));
    }

    #[test]
    fn test_format_ipv4() {
        let addr: SocketAddr = "203.0.113.5:7000".parse().unwrap();
        assert_eq!(format_address(&addr).as_str(), "203.0.113.5:7000");
    }

    #[test]
    fn test_format_ipv6_is_bracketed() {
        let addr: SocketAddr = "[::1]:9000".parse().unwrap();
        assert_eq!(format_address(&addr).as_str(), "[::1]:9000");
    }

    #[test]
    fn test_longest_literal_fits() {
        let addr: SocketAddr = "[ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff]:65535".parse().unwrap();
        let mut buf = ArrayString::<ADDRESS_TEXT_MIN_LEN>::new();
        let text = format_address_into(&addr, &mut buf).unwrap();
        assert_eq!(text, "[ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff]:65535");
    }

    #[test]
    fn test_small_buffer_is_refused() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let mut buf = ArrayString::<16>::new();
        let err = format_address_into(&addr, &mut buf).unwrap_err();
        assert_eq!(
            err,
            AddressError::BufferTooSmall {
                needed: ADDRESS_TEXT_MIN_LEN,
                provided: 16
            }
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_resolved_address_display_and_wildcard() {
        let resolved = ResolvedAddress::new("[::1]:49000".parse().unwrap(), SocketKind::Datagram);
        assert_eq!(resolved.to_string(), "[::1]:49000");
        assert!(resolved.local_wildcard().is_ipv6());
        assert_eq!(resolved.local_wildcard().port(), 0);
    }
}
