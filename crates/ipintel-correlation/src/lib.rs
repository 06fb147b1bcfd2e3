//! The correlation engine (spec §4.4): trust-weighted majority-vote fusion
//! of per-provider partial results into one canonical `CorrelatedIpRecord`,
//! with conflict reporting.
//!
//! No teacher precedent exists for domain fusion logic (this is the one
//! piece of the core with no Tower-layer analogue); implemented as plain,
//! deterministic Rust and covered by `proptest` for the order-independence
//! law (spec §8).

mod vpn_map;

use chrono::{DateTime, Utc};
use ipintel_core::model::{
    ConflictReason, ConflictReport, ConflictValue, Coordinates, CorrelatedIpRecord, Flags, Location, LocationAccuracy,
    Metadata, ProviderResult, RecordSource, RiskLevel, Threat,
};
use ipintel_core::trust::{TrustTable, VPN_IDENTIFICATION_PROVIDER, VPN_IDENTIFICATION_TRUST_RANK};

/// One provider's contribution to a single field: the value it reported and
/// the trust rank backing it.
struct Contribution {
    provider: String,
    value: String,
    trust: u8,
}

fn collect_contributions(results: &[ProviderResult], trust: &TrustTable, extract: impl Fn(&ProviderResult) -> Option<String>) -> Vec<Contribution> {
    results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| extract(r).map(|value| Contribution { provider: r.provider.clone(), value, trust: trust.rank_of(&r.provider) }))
        .collect()
}

/// One value-group within a fused field: the candidate value, the
/// providers that reported it (in first-seen order), and their combined
/// trust.
struct Group {
    value: String,
    providers: Vec<String>,
    total_trust: f64,
}

impl Group {
    fn avg_trust(&self) -> f64 {
        self.total_trust / self.providers.len() as f64
    }
}

fn group_by_value(contributions: Vec<Contribution>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for c in contributions {
        match groups.iter_mut().find(|g| g.value == c.value) {
            Some(g) => {
                g.providers.push(c.provider);
                g.total_trust += c.trust as f64;
            }
            None => groups.push(Group { value: c.value, providers: vec![c.provider], total_trust: c.trust as f64 }),
        }
    }
    groups
}

/// Fuses a single-valued string field (spec §4.4 "Single-valued string
/// fields"). Tie-break for equal count *and* equal trust: first-encountered
/// in `results` order wins (spec §9 open question — no rule is specified;
/// this is the documented, stable choice).
fn fuse_string_field(field: &str, contributions: Vec<Contribution>) -> (Option<String>, Option<ConflictReport>) {
    if contributions.is_empty() {
        return (None, None);
    }
    let groups = group_by_value(contributions);
    if groups.len() == 1 {
        return (Some(groups[0].value.clone()), None);
    }

    let max_count = groups.iter().map(|g| g.providers.len()).max().unwrap();
    let contender_indices: Vec<usize> = (0..groups.len()).filter(|&i| groups[i].providers.len() == max_count).collect();
    let unique_max = contender_indices.len() == 1;

    let mut winner = contender_indices[0];
    let mut best_trust = groups[winner].avg_trust();
    for &i in &contender_indices[1..] {
        let t = groups[i].avg_trust();
        if t > best_trust {
            best_trust = t;
            winner = i;
        }
    }

    let resolved = groups[winner].value.clone();
    let reason = if unique_max { ConflictReason::MajorityVote } else { ConflictReason::HighestTrust };
    let values = groups
        .iter()
        .map(|g| ConflictValue { value: g.value.clone(), providers: g.providers.clone(), trust_score: g.avg_trust(), count: g.providers.len() })
        .collect();
    (Some(resolved), Some(ConflictReport { field: field.to_string(), values, resolved, reason }))
}

/// Arithmetic mean of all `(lat, lon)` pairs among successful contributors
/// that reported both (spec §4.4 "Coordinates"). No conflict report — this
/// field never disagrees in the reportable sense.
fn fuse_coordinates(results: &[ProviderResult]) -> Option<Coordinates> {
    let pairs: Vec<(f64, f64)> = results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| match (r.latitude, r.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        })
        .collect();
    if pairs.is_empty() {
        return None;
    }
    let n = pairs.len() as f64;
    let lat = pairs.iter().map(|(lat, _)| lat).sum::<f64>() / n;
    let lon = pairs.iter().map(|(_, lon)| lon).sum::<f64>() / n;
    Some(Coordinates { lat, lon })
}

/// Logical OR across successful contributors (spec §4.4 "Boolean flags"):
/// any `true` wins; `false` if at least one contributor reported and none
/// was `true`; absent if nobody reported the field. Spec §9 open question:
/// this means a single noisy provider can flip the record; preserved as
/// specified.
fn fuse_flag(results: &[ProviderResult], extract: impl Fn(&ProviderResult) -> Option<bool>) -> Option<bool> {
    let mut present = false;
    let mut any_true = false;
    for r in results.iter().filter(|r| r.success) {
        if let Some(v) = extract(r) {
            present = true;
            any_true |= v;
        }
    }
    present.then_some(any_true)
}

fn fuse_abuse_score(results: &[ProviderResult]) -> Option<u8> {
    results.iter().filter(|r| r.success).filter_map(|r| r.abuse_score).max()
}

fn derive_risk_level(is_tor: Option<bool>, is_proxy: Option<bool>, is_vpn: Option<bool>, abuse_score: Option<u8>) -> Option<RiskLevel> {
    let any_signal_present = is_tor.is_some() || is_proxy.is_some() || is_vpn.is_some() || abuse_score.is_some();
    if !any_signal_present {
        return None;
    }
    let score = abuse_score.unwrap_or(0);
    if is_tor.unwrap_or(false) || score >= 70 {
        Some(RiskLevel::High)
    } else if is_proxy.unwrap_or(false) || is_vpn.unwrap_or(false) || score >= 30 {
        Some(RiskLevel::Medium)
    } else {
        Some(RiskLevel::Low)
    }
}

fn vpn_identification_trust(provider: &str, trust: &TrustTable) -> u8 {
    if provider == VPN_IDENTIFICATION_PROVIDER {
        VPN_IDENTIFICATION_TRUST_RANK
    } else {
        trust.rank_of(provider)
    }
}

/// Fuses `vpnProvider` (spec §4.4 three-step algorithm): structured fields
/// and per-provider raw-data extraction first, the static ASN/org map only
/// as a fallback when `isVpn=true` and nothing else named a provider, then
/// highest-trust resolution among distinct candidates.
fn fuse_vpn_provider(results: &[ProviderResult], trust: &TrustTable, is_vpn: Option<bool>) -> (Option<String>, Option<ConflictReport>) {
    let mut candidates: Vec<(String, String, u8)> = Vec::new();

    for r in results.iter().filter(|r| r.success) {
        let structured = r.vpn_provider.clone().filter(|s| !s.is_empty());
        let extracted = structured.or_else(|| r.raw.as_ref().and_then(|raw| ipintel_providers::adapters::extract_vpn_provider_from_raw(&r.provider, raw)));
        if let Some(value) = extracted {
            candidates.push((r.provider.clone(), value, vpn_identification_trust(&r.provider, trust)));
        }
    }

    if candidates.is_empty() && is_vpn == Some(true) {
        for r in results.iter().filter(|r| r.success) {
            if let Some(name) = r.org.as_deref().and_then(vpn_map::static_vpn_provider_for_org) {
                candidates.push((r.provider.clone(), name.to_string(), vpn_identification_trust(&r.provider, trust)));
            }
        }
    }

    if candidates.is_empty() {
        return (None, None);
    }

    let mut groups: Vec<(String, Vec<String>, u8)> = Vec::new();
    for (provider, value, rank) in candidates {
        match groups.iter_mut().find(|g| g.0 == value) {
            Some(g) => {
                g.1.push(provider);
                g.2 = g.2.max(rank);
            }
            None => groups.push((value, vec![provider], rank)),
        }
    }

    if groups.len() == 1 {
        return (Some(groups[0].0.clone()), None);
    }

    let mut winner = 0;
    let mut best = groups[0].2;
    for (i, g) in groups.iter().enumerate().skip(1) {
        if g.2 > best {
            best = g.2;
            winner = i;
        }
    }

    let resolved = groups[winner].0.clone();
    let values = groups.iter().map(|(value, providers, rank)| ConflictValue { value: value.clone(), providers: providers.clone(), trust_score: *rank as f64, count: providers.len() }).collect();
    (Some(resolved), Some(ConflictReport { field: "vpnProvider".to_string(), values, resolved, reason: ConflictReason::HighestTrust }))
}

fn finest_accuracy(country: &Option<String>, region: &Option<String>, city: &Option<String>) -> Option<LocationAccuracy> {
    if city.is_some() {
        Some(LocationAccuracy::City)
    } else if region.is_some() {
        Some(LocationAccuracy::Region)
    } else if country.is_some() {
        Some(LocationAccuracy::Country)
    } else {
        None
    }
}

/// Fuses `providerResults` into one canonical record (spec §4.4, §3
/// `CorrelatedIpRecord`). `source`/`ttl_seconds`/`now` are supplied by the
/// caller (the lookup service) rather than derived here, since correlation
/// itself has no notion of cache/db/live provenance.
pub fn correlate(ip: &str, results: &[ProviderResult], trust: &TrustTable, source: RecordSource, ttl_seconds: i64, now: DateTime<Utc>) -> CorrelatedIpRecord {
    let mut conflicts = Vec::new();

    macro_rules! fuse_field {
        ($name:literal, $extract:expr) => {{
            let (value, conflict) = fuse_string_field($name, collect_contributions(results, trust, $extract));
            if let Some(c) = conflict {
                conflicts.push(c);
            }
            value
        }};
    }

    let asn = fuse_field!("asn", |r: &ProviderResult| r.asn.clone());
    let org = fuse_field!("org", |r: &ProviderResult| r.org.clone());
    let country = fuse_field!("country", |r: &ProviderResult| r.country.clone());
    let region = fuse_field!("region", |r: &ProviderResult| r.region.clone());
    let city = fuse_field!("city", |r: &ProviderResult| r.city.clone());
    let timezone = fuse_field!("timezone", |r: &ProviderResult| r.timezone.clone());

    let coordinates = fuse_coordinates(results);
    let accuracy = finest_accuracy(&country, &region, &city);

    let is_proxy = fuse_flag(results, |r| r.is_proxy);
    let is_vpn = fuse_flag(results, |r| r.is_vpn);
    let is_tor = fuse_flag(results, |r| r.is_tor);
    let is_hosting = fuse_flag(results, |r| r.is_hosting);
    let is_mobile = fuse_flag(results, |r| r.is_mobile);

    let (vpn_provider, vpn_conflict) = fuse_vpn_provider(results, trust, is_vpn);
    if let Some(c) = vpn_conflict {
        conflicts.push(c);
    }

    let abuse_score = fuse_abuse_score(results);
    let risk_level = derive_risk_level(is_tor, is_proxy, is_vpn, abuse_score);

    let succeeded = results.iter().filter(|r| r.success).count();
    let confidence = (100.0 * (succeeded as f64 / 10.0).min(1.0)).round() as u8;

    let warnings: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| format!("Provider '{}' failed: {}", r.provider, r.error.as_deref().unwrap_or("unknown error")))
        .collect();
    let partial_data = !warnings.is_empty();

    CorrelatedIpRecord {
        ip: ip.to_string(),
        asn,
        org,
        location: Location { country, region, city, coordinates, timezone, accuracy },
        flags: Flags { is_proxy, is_vpn, is_tor, is_hosting, is_mobile, vpn_provider, confidence },
        threat: Threat { abuse_score, risk_level },
        metadata: Metadata {
            providers: results.iter().map(|r| r.provider.clone()).collect(),
            conflicts: (!conflicts.is_empty()).then_some(conflicts),
            source,
            created_at: now,
            updated_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
            ttl_seconds,
            warnings: (!warnings.is_empty()).then_some(warnings),
            partial_data,
            providers_queried: results.len(),
            providers_succeeded: succeeded,
            llm_analysis: None,
        },
    }
}
