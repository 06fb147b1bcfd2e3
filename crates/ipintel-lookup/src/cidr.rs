//! CIDR expansion (spec §4.5 "CIDR lookup").

use ipintel_core::model::CidrInfo;
use ipintel_core::LookupError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Expands `input` (e.g. `"198.51.100.0/30"`) to its host IPs in ascending
/// order, refusing anything whose expansion exceeds `max_hosts` (spec:
/// "whose expansion is ≤ 256 hosts, i.e. ≥/24 for IPv4, ≥/120 for IPv6").
pub fn expand(input: &str, max_hosts: u32) -> Result<(CidrInfo, Vec<String>), LookupError> {
    let (addr_part, prefix_part) = input.split_once('/').ok_or_else(|| LookupError::invalid_cidr(input))?;
    let addr: IpAddr = addr_part.trim().parse().map_err(|_| LookupError::invalid_cidr(input))?;
    let prefix: u8 = prefix_part.trim().parse().map_err(|_| LookupError::invalid_cidr(input))?;

    match addr {
        IpAddr::V4(v4) => expand_v4(input, v4, prefix, max_hosts),
        IpAddr::V6(v6) => expand_v6(input, v6, prefix, max_hosts),
    }
}

fn expand_v4(input: &str, addr: Ipv4Addr, prefix: u8, max_hosts: u32) -> Result<(CidrInfo, Vec<String>), LookupError> {
    if prefix > 32 {
        return Err(LookupError::invalid_cidr(input));
    }
    let host_bits = 32 - prefix as u32;
    let total: u32 = if host_bits >= 32 { u32::MAX } else { 1u32 << host_bits };
    if total > max_hosts {
        return Err(LookupError::cidr_too_large(prefix, max_hosts));
    }

    let mask: u32 = if prefix == 0 { 0 } else { u32::MAX << host_bits };
    let network = u32::from(addr) & mask;

    let ips = (0..total).map(|i| Ipv4Addr::from(network + i).to_string()).collect();
    let info = CidrInfo { input: input.to_string(), network: Ipv4Addr::from(network).to_string(), prefix_length: prefix, total_ips: total };
    Ok((info, ips))
}

fn expand_v6(input: &str, addr: Ipv6Addr, prefix: u8, max_hosts: u32) -> Result<(CidrInfo, Vec<String>), LookupError> {
    if prefix > 128 {
        return Err(LookupError::invalid_cidr(input));
    }
    let host_bits = 128 - prefix as u32;
    if host_bits > 31 {
        // Even the largest permitted expansion (256 hosts => host_bits<=8)
        // fits comfortably in u32; anything requiring more bits than that
        // is always over `max_hosts`.
        return Err(LookupError::cidr_too_large(prefix, max_hosts));
    }
    let total: u32 = 1u32 << host_bits;
    if total > max_hosts {
        return Err(LookupError::cidr_too_large(prefix, max_hosts));
    }

    let mask: u128 = if prefix == 0 { 0 } else { u128::MAX << host_bits };
    let network = u128::from(addr) & mask;

    let ips = (0..total as u128).map(|i| Ipv6Addr::from(network + i).to_string().to_lowercase()).collect();
    let info = CidrInfo { input: input.to_string(), network: Ipv6Addr::from(network).to_string().to_lowercase(), prefix_length: prefix, total_ips: total };
    Ok((info, ips))
}
