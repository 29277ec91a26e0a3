//! The fixed-shape geolocation record.

use serde::{Deserialize, Serialize};

/// Every key a serialized [`GeoRecord`] carries, in serialization order.
pub const FIELD_NAMES: [&str; 14] = [
    "city",
    "region_name",
    "region",
    "area_code",
    "time_zone",
    "longitude",
    "metro_code",
    "country_code3",
    "latitude",
    "postal_code",
    "dma_code",
    "country_code",
    "country_name",
    "org",
];

/// Geolocation for one address.
///
/// Missing values serialize as explicit `null`s, never as absent keys, so the
/// key set is the same whether or not a lookup matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoRecord {
    pub city: Option<String>,
    pub region_name: Option<String>,
    /// Subdivision code
    pub region: Option<String>,
    pub area_code: Option<u32>,
    pub time_zone: Option<String>,
    pub longitude: Option<f64>,
    pub metro_code: Option<u32>,
    pub country_code3: Option<String>,
    pub latitude: Option<f64>,
    pub postal_code: Option<String>,
    pub dma_code: Option<u32>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    /// Autonomous system, e.g. `AS15169 Google LLC`
    pub org: Option<String>,
}

impl GeoRecord {
    /// Whether no field is populated
    pub fn is_empty(&self) -> bool {
        *self == GeoRecord::default()
    }
}
