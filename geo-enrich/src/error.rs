//! Error types for the geo-enrich crate.

/// Errors opening a geolocation source.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// Database file missing or unreadable
    #[error("Failed to open geolocation database {path}: {reason}")]
    Open {
        /// Path that was opened
        path: String,
        /// Reader error
        reason: String,
    },
}

/// Errors from a single lookup. Never leaves [`crate::GeoEnricher`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The source failed to answer
    #[error("Lookup failed: {0}")]
    Source(String),
}
