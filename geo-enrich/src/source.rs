//! Lookup source capabilities and their raw results.

use std::net::IpAddr;

use crate::error::LookupError;

/// Text exactly as a lookup source returned it.
///
/// Legacy databases store names as ISO-8859-1; newer ones as UTF-8. The
/// enricher turns every `RawText` into canonical text with
/// [`into_canonical`](Self::into_canonical) before it reaches a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText(Vec<u8>);

impl RawText {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// UTF-8 if the bytes are valid UTF-8, otherwise ISO-8859-1.
    pub fn into_canonical(self) -> String {
        match String::from_utf8(self.0) {
            Ok(text) => text,
            Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
        }
    }
}

impl From<&str> for RawText {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for RawText {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

/// Place-level result before text normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlace {
    pub city: Option<RawText>,
    pub region_name: Option<RawText>,
    pub region: Option<RawText>,
    pub area_code: Option<u32>,
    pub time_zone: Option<RawText>,
    pub longitude: Option<f64>,
    pub metro_code: Option<u32>,
    pub country_code3: Option<RawText>,
    pub latitude: Option<f64>,
    pub postal_code: Option<RawText>,
    pub dma_code: Option<u32>,
    pub country_code: Option<RawText>,
    pub country_name: Option<RawText>,
}

/// City/region/country database.
///
/// `Ok(None)` means the address is not in the database.
pub trait PlaceSource: Send + Sync {
    fn place(&self, ip: IpAddr) -> Result<Option<RawPlace>, LookupError>;
}

/// Organization (autonomous system) database.
pub trait OrgSource: Send + Sync {
    fn org(&self, ip: IpAddr) -> Result<Option<RawText>, LookupError>;
}
