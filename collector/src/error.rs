//! Error types for the collector.

use std::path::PathBuf;

use broker_link::{LinkError, LinkRole};
use event_normalizer::{DecodeError, NormalizerError};
use geo_enrich::GeoError;

/// Configuration could not be loaded or is unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("MHN_UUID is required (set it in the configuration file or the environment)")]
    MissingUuid,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures that end the collector before or while it runs.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open geolocation databases: {0}")]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Channels(#[from] NormalizerError),

    #[error("Could not connect {role} link: {source}")]
    Connect {
        role: LinkRole,
        #[source]
        source: LinkError,
    },

    #[error("Could not subscribe inbound link: {0}")]
    Subscribe(#[source] LinkError),
}

/// Why one message or event was dropped by the relay pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

/// Convenience type alias for Results using CollectorError.
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_names_the_role() {
        let error = CollectorError::Connect {
            role: LinkRole::Outbound,
            source: LinkError::NotConnected,
        };
        assert!(error.to_string().starts_with("Could not connect outbound link"));
    }

    #[test]
    fn test_unhandled_channels_message_is_passed_through() {
        let error: CollectorError =
            NormalizerError::UnhandledChannels(vec!["cowrie.sessions".to_string()]).into();
        assert_eq!(
            error.to_string(),
            "No decoder registered for channel(s): cowrie.sessions"
        );
    }
}
