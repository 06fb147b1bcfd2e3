//! Static ASN/organization → commercial VPN operator map (spec §4.4
//! `vpn_provider` step 2: "If `isVpn=true` and none found, apply a static
//! ASN/organization → provider map (built-in table of ~12 known commercial
//! VPN operators)").
//!
//! Matching is a case-insensitive substring test against the provider's
//! reported `org` string — real-world WHOIS/ASN org fields for these
//! operators' egress infrastructure routinely embed the brand name
//! (`"NordVPN S.A."`, `"ProtonVPN AG"`, ...).

const MARKERS: &[(&str, &str)] = &[
    ("nordvpn", "NordVPN"),
    ("expressvpn", "ExpressVPN"),
    ("surfshark", "Surfshark"),
    ("cyberghost", "CyberGhost"),
    ("private internet access", "Private Internet Access"),
    ("protonvpn", "ProtonVPN"),
    ("mullvad", "Mullvad"),
    ("ipvanish", "IPVanish"),
    ("purevpn", "PureVPN"),
    ("windscribe", "Windscribe"),
    ("tunnelbear", "TunnelBear"),
    ("hotspot shield", "Hotspot Shield"),
];

pub fn static_vpn_provider_for_org(org: &str) -> Option<&'static str> {
    let lower = org.to_lowercase();
    MARKERS.iter().find(|(marker, _)| lower.contains(marker)).map(|(_, name)| *name)
}
