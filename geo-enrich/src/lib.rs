//! # geo-enrich
//!
//! Maps an address to a [`GeoRecord`] with a fixed set of fourteen fields.
//!
//! Two independent read-only sources back every lookup: a place-level source
//! (city, region, coordinates, country) and an organization-level source
//! (autonomous system). Either may miss or fail without affecting the other,
//! and no failure is ever surfaced to the caller; the affected fields simply
//! stay null. Raw text from a source is normalized to canonical UTF-8 right
//! after the source returns, so consumers never see legacy encodings.

mod country;
mod enricher;
mod error;
mod maxmind;
mod record;
mod source;

pub use country::alpha3;
pub use enricher::GeoEnricher;
pub use error::{GeoError, LookupError};
pub use maxmind::{MaxmindOrgSource, MaxmindPlaceSource};
pub use record::{GeoRecord, FIELD_NAMES};
pub use source::{OrgSource, PlaceSource, RawPlace, RawText};
