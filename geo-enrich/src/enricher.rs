//! Address to [`GeoRecord`] mapping.

use std::net::IpAddr;
use std::path::Path;

use crate::error::GeoError;
use crate::maxmind::{MaxmindOrgSource, MaxmindPlaceSource};
use crate::record::GeoRecord;
use crate::source::{OrgSource, PlaceSource, RawPlace, RawText};

/// Enriches addresses from a place source and an organization source.
pub struct GeoEnricher {
    place: Box<dyn PlaceSource>,
    org: Box<dyn OrgSource>,
}

impl GeoEnricher {
    pub fn new(place: impl PlaceSource + 'static, org: impl OrgSource + 'static) -> Self {
        Self {
            place: Box::new(place),
            org: Box::new(org),
        }
    }

    /// Open MaxMind City and ASN databases.
    pub fn open(geo_db: impl AsRef<Path>, asn_db: impl AsRef<Path>) -> Result<Self, GeoError> {
        let place = MaxmindPlaceSource::open(geo_db)?;
        let org = MaxmindOrgSource::open(asn_db)?;
        Ok(Self::new(place, org))
    }

    /// Look up an address. Total: every failure degrades to null fields.
    pub fn lookup(&self, ip: Option<&str>) -> GeoRecord {
        let mut record = GeoRecord::default();

        let Some(raw) = ip else {
            return record;
        };
        let addr = match raw.trim().parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                tracing::debug!(ip = raw, "Not an IP address, skipping geolocation");
                return record;
            }
        };

        match self.place.place(addr) {
            Ok(Some(place)) => apply_place(&mut record, place),
            Ok(None) => tracing::trace!(%addr, "No place match"),
            Err(e) => tracing::debug!(%addr, error = %e, "Place lookup failed"),
        }

        match self.org.org(addr) {
            Ok(Some(org)) => record.org = Some(org.into_canonical()),
            Ok(None) => tracing::trace!(%addr, "No organization match"),
            Err(e) => tracing::debug!(%addr, error = %e, "Organization lookup failed"),
        }

        record
    }
}

impl std::fmt::Debug for GeoEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoEnricher").finish_non_exhaustive()
    }
}

fn text(value: Option<RawText>) -> Option<String> {
    value.map(RawText::into_canonical)
}

fn apply_place(record: &mut GeoRecord, place: RawPlace) {
    record.city = text(place.city);
    record.region_name = text(place.region_name);
    record.region = text(place.region);
    record.area_code = place.area_code;
    record.time_zone = text(place.time_zone);
    record.longitude = place.longitude;
    record.metro_code = place.metro_code;
    record.country_code3 = text(place.country_code3);
    record.latitude = place.latitude;
    record.postal_code = text(place.postal_code);
    record.dma_code = place.dma_code;
    record.country_code = text(place.country_code);
    record.country_name = text(place.country_name);
}
