//! Collector configuration.
//!
//! The configuration is a JSON object whose keys are the upper-case names
//! below (`HOST`, `RCHANNEL`, `IP_GEO_DB` ...). Every key is optional except
//! `MHN_UUID`; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use broker_link::{LinkConfig, LinkRole};
use event_normalizer::DEFAULT_CHANNELS;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable consulted when the file has no `MHN_UUID`
pub const UUID_ENV: &str = "MHN_UUID";

/// Collector settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct CollectorConfig {
    /// Inbound broker host
    /// Default: localhost
    pub host: String,

    /// Inbound broker port
    /// Default: 10000
    pub port: u16,

    /// Inbound identity
    /// Default: collector
    pub ident: String,

    /// Inbound secret
    /// Default: empty
    pub secret: String,

    /// Inbound subscription channels
    /// Default: every channel with a built-in decoder
    pub channels: Vec<String>,

    /// Channels accepted without a decoder; their messages are dropped
    /// Default: none
    pub ignore_channels: Vec<String>,

    /// Outbound broker host
    /// Default: mhnbroker.threatstream.com
    pub rhost: String,

    /// Outbound broker port
    /// Default: 10000
    pub rport: u16,

    /// Outbound identity
    /// Default: mhn-server
    pub rident: String,

    /// Outbound secret
    /// Default: mhn-secret
    pub rsecret: String,

    /// Outbound channel every event is published on
    /// Default: mhn-community-v2.events
    pub rchannel: String,

    /// City database
    /// Default: /opt/GeoLite2-City.mmdb
    pub ip_geo_db: PathBuf,

    /// ASN database
    /// Default: /opt/GeoLite2-ASN.mmdb
    pub ip_asn_db: PathBuf,

    /// Deployment identity attached to every event
    pub mhn_uuid: Option<String>,

    /// Extra inbound connect attempts before giving up
    /// Default: 0
    pub connect_retries: u32,

    /// Delay between inbound connect attempts, in seconds
    /// Default: 5
    pub connect_retry_delay_secs: u64,

    /// Capacity of the outbound publish queue
    /// Default: 10000
    pub outbound_queue_size: usize,

    /// Capacity of the inbound message channel
    /// Default: 1000
    pub inbound_buffer_size: usize,

    /// Endpoint answering with the caller's public IPv4 address
    /// Default: http://ipv4.icanhazip.com/
    pub ip_discovery_url: String,

    /// Public IP discovery timeout, in seconds
    /// Default: 5
    pub ip_discovery_timeout_secs: u64,

    /// JSON credential directory for the inbound identity
    /// Default: none (provisioning skipped)
    pub auth_keys_file: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 10000,
            ident: "collector".to_string(),
            secret: String::new(),
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            ignore_channels: Vec::new(),
            rhost: "mhnbroker.threatstream.com".to_string(),
            rport: 10000,
            rident: "mhn-server".to_string(),
            rsecret: "mhn-secret".to_string(),
            rchannel: "mhn-community-v2.events".to_string(),
            ip_geo_db: PathBuf::from("/opt/GeoLite2-City.mmdb"),
            ip_asn_db: PathBuf::from("/opt/GeoLite2-ASN.mmdb"),
            mhn_uuid: None,
            connect_retries: 0,
            connect_retry_delay_secs: 5,
            outbound_queue_size: 10_000,
            inbound_buffer_size: 1_000,
            ip_discovery_url: "http://ipv4.icanhazip.com/".to_string(),
            ip_discovery_timeout_secs: 5,
            auth_keys_file: None,
        }
    }
}

impl CollectorConfig {
    /// Load and validate the configuration.
    ///
    /// Without a file the defaults are used. `MHN_UUID` falls back to the
    /// environment variable of the same name.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                tracing::warn!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file without validating it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill `MHN_UUID` from `lookup` when the file left it unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let unset = self.mhn_uuid.as_deref().map_or(true, |id| id.trim().is_empty());
        if unset {
            self.mhn_uuid = lookup(UUID_ENV).filter(|id| !id.trim().is_empty());
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), ConfigError> {
        let uuid = self.deployment_id()?;
        if uuid::Uuid::parse_str(uuid).is_err() {
            tracing::warn!(mhn_uuid = uuid, "MHN_UUID is not a UUID, using it as given");
        }

        if self.host.trim().is_empty() || self.rhost.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Broker hosts must not be empty".to_string(),
            ));
        }

        if self.port == 0 || self.rport == 0 {
            return Err(ConfigError::Invalid(
                "Broker ports must be greater than 0".to_string(),
            ));
        }

        if self.channels.is_empty() {
            return Err(ConfigError::Invalid(
                "At least one inbound channel is required".to_string(),
            ));
        }

        if self.rchannel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Outbound channel must not be empty".to_string(),
            ));
        }

        if self.outbound_queue_size == 0 || self.inbound_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "Queue sizes must be greater than 0".to_string(),
            ));
        }

        url::Url::parse(&self.ip_discovery_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "Invalid IP_DISCOVERY_URL {}: {e}",
                self.ip_discovery_url
            ))
        })?;

        Ok(())
    }

    /// The configured `MHN_UUID`
    pub fn deployment_id(&self) -> Result<&str, ConfigError> {
        self.mhn_uuid
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingUuid)
    }

    pub fn inbound_link(&self) -> LinkConfig {
        LinkConfig::new(
            LinkRole::Inbound,
            &self.host,
            self.port,
            &self.ident,
            &self.secret,
        )
        .with_inbound_capacity(self.inbound_buffer_size)
    }

    pub fn outbound_link(&self) -> LinkConfig {
        LinkConfig::new(
            LinkRole::Outbound,
            &self.rhost,
            self.rport,
            &self.rident,
            &self.rsecret,
        )
        .with_queue_capacity(self.outbound_queue_size)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_secs)
    }

    pub fn ip_discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.ip_discovery_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> CollectorConfig {
        CollectorConfig {
            mhn_uuid: Some("8d9e3c5a-1f2b-4c6d-9e8f-0a1b2c3d4e5f".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 10000);
        assert_eq!(config.ident, "collector");
        assert_eq!(config.rhost, "mhnbroker.threatstream.com");
        assert_eq!(config.rchannel, "mhn-community-v2.events");
        assert_eq!(config.channels.len(), 13);
        assert_eq!(config.connect_retries, 0);
        assert_eq!(config.outbound_queue_size, 10_000);
    }

    #[test]
    fn test_parse_upper_case_keys_and_ignore_unknown() {
        let config: CollectorConfig = serde_json::from_str(
            r#"{
                "HOST": "10.1.1.1", "PORT": 20000, "IDENT": "c2", "SECRET": "x",
                "CHANNELS": ["dionaea.capture"], "RCHANNEL": "private.events",
                "MHN_UUID": "abc", "CONNECT_RETRIES": 3, "SOMETHING_ELSE": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.host, "10.1.1.1");
        assert_eq!(config.port, 20000);
        assert_eq!(config.channels, vec!["dionaea.capture"]);
        assert_eq!(config.rchannel, "private.events");
        assert_eq!(config.connect_retries, 3);
        assert_eq!(config.rhost, "mhnbroker.threatstream.com");
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"MHN_UUID": "8d9e3c5a-1f2b-4c6d-9e8f-0a1b2c3d4e5f", "RPORT": 10001}}"#)
            .unwrap();

        let config = CollectorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.rport, 10001);
    }

    #[test]
    fn test_load_errors() {
        let missing = CollectorConfig::from_file(Path::new("/nonexistent/collector.json"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            CollectorConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_uuid_from_environment() {
        let mut config = CollectorConfig::default();
        config.apply_env(|key| (key == UUID_ENV).then(|| "from-env".to_string()));
        assert_eq!(config.deployment_id().unwrap(), "from-env");

        let mut config = valid();
        config.apply_env(|_| Some("from-env".to_string()));
        assert_eq!(
            config.deployment_id().unwrap(),
            "8d9e3c5a-1f2b-4c6d-9e8f-0a1b2c3d4e5f"
        );
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        assert!(matches!(
            CollectorConfig::default().validate(),
            Err(ConfigError::MissingUuid)
        ));

        let blank_uuid = CollectorConfig {
            mhn_uuid: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(blank_uuid.validate(), Err(ConfigError::MissingUuid)));

        let not_a_uuid = CollectorConfig {
            mhn_uuid: Some("deployment-7".to_string()),
            ..Default::default()
        };
        assert!(not_a_uuid.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let cases = [
            CollectorConfig { host: String::new(), ..valid() },
            CollectorConfig { rport: 0, ..valid() },
            CollectorConfig { channels: Vec::new(), ..valid() },
            CollectorConfig { rchannel: " ".to_string(), ..valid() },
            CollectorConfig { outbound_queue_size: 0, ..valid() },
            CollectorConfig { ip_discovery_url: "not a url".to_string(), ..valid() },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{config:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_link_configs() {
        let config = CollectorConfig {
            secret: "s".to_string(),
            outbound_queue_size: 5,
            ..valid()
        };

        let inbound = config.inbound_link();
        assert_eq!(inbound.role, LinkRole::Inbound);
        assert_eq!(inbound.endpoint(), "localhost:10000");
        assert_eq!(inbound.secret, "s");

        let outbound = config.outbound_link();
        assert_eq!(outbound.role, LinkRole::Outbound);
        assert_eq!(outbound.ident, "mhn-server");
        assert_eq!(outbound.queue_capacity, 5);
    }
}
