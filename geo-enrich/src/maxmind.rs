//! MaxMind DB backed sources.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

use maxminddb::{geoip2, MaxMindDBError, Reader};

use crate::country::alpha3;
use crate::error::{GeoError, LookupError};
use crate::source::{OrgSource, PlaceSource, RawPlace, RawText};

fn open_reader(path: &Path) -> Result<Reader<Vec<u8>>, GeoError> {
    Reader::open_readfile(path).map_err(|e| GeoError::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn lookup_error(e: MaxMindDBError) -> LookupError {
    LookupError::Source(e.to_string())
}

fn english(names: &Option<BTreeMap<&str, &str>>) -> Option<RawText> {
    names
        .as_ref()
        .and_then(|names| names.get("en"))
        .map(|name| RawText::from(*name))
}

/// GeoIP2 / GeoLite2 City database.
pub struct MaxmindPlaceSource {
    reader: Reader<Vec<u8>>,
}

impl MaxmindPlaceSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GeoError> {
        let reader = open_reader(path.as_ref())?;
        tracing::info!(
            path = %path.as_ref().display(),
            database_type = %reader.metadata.database_type,
            "Opened place database"
        );
        Ok(Self { reader })
    }
}

impl PlaceSource for MaxmindPlaceSource {
    fn place(&self, ip: IpAddr) -> Result<Option<RawPlace>, LookupError> {
        let city: geoip2::City = match self.reader.lookup(ip) {
            Ok(city) => city,
            Err(MaxMindDBError::AddressNotFoundError(_)) => return Ok(None),
            Err(e) => return Err(lookup_error(e)),
        };

        let mut place = RawPlace::default();

        if let Some(c) = &city.city {
            place.city = english(&c.names);
        }

        if let Some(subdivision) = city.subdivisions.as_ref().and_then(|s| s.first()) {
            place.region_name = english(&subdivision.names);
            place.region = subdivision.iso_code.map(RawText::from);
        }

        if let Some(location) = &city.location {
            place.latitude = location.latitude;
            place.longitude = location.longitude;
            place.time_zone = location.time_zone.map(RawText::from);
            // The legacy format reported the same value under both names
            place.metro_code = location.metro_code.map(u32::from);
            place.dma_code = place.metro_code;
        }

        if let Some(postal) = &city.postal {
            place.postal_code = postal.code.map(RawText::from);
        }

        if let Some(country) = &city.country {
            place.country_code = country.iso_code.map(RawText::from);
            place.country_code3 = country.iso_code.and_then(alpha3).map(RawText::from);
            place.country_name = english(&country.names);
        }

        Ok(Some(place))
    }
}

/// GeoLite2 ASN database, rendered as `AS<number> <organization>`.
pub struct MaxmindOrgSource {
    reader: Reader<Vec<u8>>,
}

impl MaxmindOrgSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GeoError> {
        let reader = open_reader(path.as_ref())?;
        tracing::info!(
            path = %path.as_ref().display(),
            database_type = %reader.metadata.database_type,
            "Opened organization database"
        );
        Ok(Self { reader })
    }
}

impl OrgSource for MaxmindOrgSource {
    fn org(&self, ip: IpAddr) -> Result<Option<RawText>, LookupError> {
        let asn: geoip2::Asn = match self.reader.lookup(ip) {
            Ok(asn) => asn,
            Err(MaxMindDBError::AddressNotFoundError(_)) => return Ok(None),
            Err(e) => return Err(lookup_error(e)),
        };

        Ok(format_org(
            asn.autonomous_system_number,
            asn.autonomous_system_organization,
        ))
    }
}

fn format_org(number: Option<u32>, organization: Option<&str>) -> Option<RawText> {
    let text = match (number, organization) {
        (Some(number), Some(organization)) => format!("AS{number} {organization}"),
        (Some(number), None) => format!("AS{number}"),
        (None, Some(organization)) => organization.to_string(),
        (None, None) => return None,
    };
    Some(RawText::from(text))
}
