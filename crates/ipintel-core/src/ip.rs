//! IP key canonicalization and validation (spec §3 "IP key", §4.5 step 1).
//!
//! Canonicalization is pure and synchronous; DNS fallback resolution (spec
//! §4.5: "If `input` does not syntactically resemble an IP, attempt a
//! single A-record DNS resolution") is an I/O operation and lives in
//! `ipintel-lookup`, which calls back into `normalize` once it has a
//! candidate address string.

use crate::error::LookupError;
use std::net::IpAddr;

/// A normalized IP address: trimmed, lowercase (for IPv6's textual form),
/// validated to be neither private, reserved, loopback, nor multicast.
///
/// This is the key used for cache and database lookups (spec §3 invariant:
/// "keys stored in Cache/DB are always post-normalization").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedIp(String);

impl NormalizedIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedIp {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `true` if `input` looks enough like an IP literal to skip DNS resolution
/// (spec §4.5: "if `input` does not syntactically resemble an IP, attempt
/// ... DNS resolution"). A loose heuristic is deliberate: anything that
/// fails to parse as an `IpAddr` falls through to DNS rather than being
/// rejected outright, so hostnames reach the resolver.
pub fn looks_like_ip(input: &str) -> bool {
    input.trim().parse::<IpAddr>().is_ok()
}

/// Canonicalize and validate a syntactic IP literal.
///
/// Invariant enforced here: rejects private, reserved, loopback, and
/// multicast ranges, and anything that fails to parse as an `IpAddr`.
pub fn normalize(input: &str) -> Result<NormalizedIp, LookupError> {
    let trimmed = input.trim();
    let addr: IpAddr = trimmed.parse().map_err(|_| LookupError::invalid_format(trimmed))?;
    validate_public(&addr)?;
    Ok(NormalizedIp(canonical_text(&addr)))
}

fn canonical_text(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => v4.to_string(),
        // IPv6 invariant (spec §3): "lowercased IPv6". `Ipv6Addr::to_string`
        // already produces the compressed, lowercase canonical form.
        IpAddr::V6(v6) => v6.to_string().to_lowercase(),
    }
}

fn validate_public(addr: &IpAddr) -> Result<(), LookupError> {
    let text = addr.to_string();
    match addr {
        IpAddr::V4(v4) => {
            if v4.is_loopback() || v4.is_unspecified() {
                return Err(LookupError::reserved_ip(&text));
            }
            if v4.is_private() || v4.is_link_local() {
                return Err(LookupError::private_ip(&text));
            }
            if v4.is_multicast() || v4.is_broadcast() || v4.is_documentation() {
                return Err(LookupError::reserved_ip(&text));
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() || v6.is_unspecified() {
                return Err(LookupError::reserved_ip(&text));
            }
            if v6.is_multicast() {
                return Err(LookupError::reserved_ip(&text));
            }
            // fc00::/7 unique local addresses are the IPv6 analogue of
            // RFC1918 private space.
            if (v6.segments()[0] & 0xfe00) == 0xfc00 {
                return Err(LookupError::private_ip(&text));
            }
            // fe80::/10 link-local.
            if (v6.segments()[0] & 0xffc0) == 0xfe80 {
                return Err(LookupError::private_ip(&text));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_v4() {
        assert_eq!(normalize("8.8.8.8").unwrap().as_str(), "8.8.8.8");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize("  8.8.8.8  ").unwrap().as_str(), "8.8.8.8");
    }

    #[test]
    fn lowercases_v6() {
        let n = normalize("2001:4860:4860::8888").unwrap();
        assert_eq!(n.as_str(), "2001:4860:4860::8888");
    }

    #[test]
    fn rejects_private_v4() {
        let err = normalize("192.168.1.1").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::PrivateIp);
    }

    #[test]
    fn rejects_loopback() {
        let err = normalize("127.0.0.1").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ReservedIp);
    }

    #[test]
    fn rejects_multicast() {
        let err = normalize("224.0.0.1").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ReservedIp);
    }

    #[test]
    fn rejects_invalid_syntax() {
        let err = normalize("not-an-ip").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidFormat);
    }

    #[test]
    fn rejects_ipv6_unique_local() {
        let err = normalize("fd00::1").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::PrivateIp);
    }

    #[test]
    fn looks_like_ip_heuristic() {
        assert!(looks_like_ip("8.8.8.8"));
        assert!(looks_like_ip("::1"));
        assert!(!looks_like_ip("example.com"));
    }
}
