//! Key-set and round-trip properties of enriched records.

use std::net::IpAddr;

use geo_enrich::{
    GeoEnricher, GeoRecord, LookupError, OrgSource, PlaceSource, RawPlace, RawText, FIELD_NAMES,
};
use proptest::prelude::*;

/// Answers every IPv4 lookup from the documentation range and misses the rest.
struct DocumentationRange;

impl PlaceSource for DocumentationRange {
    fn place(&self, ip: IpAddr) -> Result<Option<RawPlace>, LookupError> {
        match ip {
            IpAddr::V4(v4) if v4.octets()[0] == 192 => Ok(Some(RawPlace {
                city: Some(RawText::from_bytes(b"Montr\xe9al".to_vec())),
                region_name: Some("Québec".into()),
                region: Some("QC".into()),
                latitude: Some(45.508_840_123_456_78),
                longitude: Some(-73.587_810_987_654_32),
                country_code: Some("CA".into()),
                country_code3: Some("CAN".into()),
                country_name: Some("Canada".into()),
                ..Default::default()
            })),
            IpAddr::V4(v4) if v4.octets()[0] == 203 => {
                Err(LookupError::Source("simulated failure".to_string()))
            }
            _ => Ok(None),
        }
    }
}

impl OrgSource for DocumentationRange {
    fn org(&self, ip: IpAddr) -> Result<Option<RawText>, LookupError> {
        match ip {
            IpAddr::V4(v4) if v4.octets()[0] == 198 => {
                Err(LookupError::Source("simulated failure".to_string()))
            }
            IpAddr::V4(_) => Ok(Some("AS64496 Documentation".into())),
            IpAddr::V6(_) => Ok(None),
        }
    }
}

fn enricher() -> GeoEnricher {
    GeoEnricher::new(DocumentationRange, DocumentationRange)
}

fn keys(record: &GeoRecord) -> Vec<String> {
    let value = serde_json::to_value(record).unwrap();
    value.as_object().unwrap().keys().cloned().collect()
}

fn expected_keys() -> Vec<String> {
    let mut names: Vec<String> = FIELD_NAMES.iter().map(|n| n.to_string()).collect();
    names.sort();
    names
}

#[test]
fn test_key_set_for_hit_miss_and_null() {
    let enricher = enricher();
    for input in [Some("192.0.2.10"), Some("203.0.113.9"), Some("::1"), None] {
        let mut actual = keys(&enricher.lookup(input));
        actual.sort();
        assert_eq!(actual, expected_keys(), "input {input:?}");
    }
}

#[test]
fn test_round_trip_preserves_text_and_precision() {
    let record = enricher().lookup(Some("192.0.2.10"));
    assert_eq!(record.city.as_deref(), Some("Montréal"));

    let json = serde_json::to_string(&record).unwrap();
    let decoded: GeoRecord = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded, record);
    assert_eq!(decoded.latitude, Some(45.508_840_123_456_78));
    assert_eq!(decoded.longitude, Some(-73.587_810_987_654_32));
    assert_eq!(decoded.region_name.as_deref(), Some("Québec"));
}

#[test]
fn test_sources_degrade_independently() {
    let enricher = enricher();

    let place_failed = enricher.lookup(Some("203.0.113.9"));
    assert_eq!(place_failed.country_code, None);
    assert_eq!(place_failed.org.as_deref(), Some("AS64496 Documentation"));

    let org_failed = enricher.lookup(Some("198.51.100.7"));
    assert_eq!(org_failed.org, None);
}

proptest! {
    #[test]
    fn prop_any_string_yields_fourteen_keys(input in ".{0,64}") {
        let mut actual = keys(&enricher().lookup(Some(&input)));
        actual.sort();
        prop_assert_eq!(actual, expected_keys());
    }

    #[test]
    fn prop_any_ipv4_yields_fourteen_keys(octets in any::<[u8; 4]>()) {
        let ip = IpAddr::from(octets).to_string();
        let mut actual = keys(&enricher().lookup(Some(&ip)));
        actual.sort();
        prop_assert_eq!(actual, expected_keys());
    }
}
