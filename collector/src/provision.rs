//! One-time credential provisioning for the inbound identity.
//!
//! The local broker authenticates clients against a credential directory.
//! At startup the collector makes sure its own identity is present there with
//! subscribe rights on every inbound channel.
//!
//! [`JsonFileProvisioner`] keeps that directory as a JSON array mirroring
//! the hpfeeds broker's `auth_key` collection: one document per
//! `identifier` with its `secret`, `publish` and `subscribe` lists.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One broker credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub identifier: String,
    pub secret: String,
    pub publish: Vec<String>,
    pub subscribe: Vec<String>,
}

impl AuthRecord {
    /// A subscribe-only record
    pub fn subscriber(
        identifier: impl Into<String>,
        secret: impl Into<String>,
        channels: &[String],
    ) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
            publish: Vec::new(),
            subscribe: channels.to_vec(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Credential store {path} is unreadable: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential store {path} is not a JSON array of records: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write credential store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Something that can make sure a credential exists.
pub trait CredentialProvisioner: Send + Sync {
    /// Insert `record`, or replace the record with the same identifier.
    fn ensure(&self, record: &AuthRecord) -> Result<(), ProvisionError>;
}

/// Credential directory kept as a JSON array in a file.
#[derive(Debug, Clone)]
pub struct JsonFileProvisioner {
    path: PathBuf,
}

impl JsonFileProvisioner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current records; a missing file is an empty directory
    pub fn records(&self) -> Result<Vec<AuthRecord>, ProvisionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ProvisionError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|source| ProvisionError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, records: &[AuthRecord]) -> Result<(), ProvisionError> {
        let write_error = |source: std::io::Error| ProvisionError::Write {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| write_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        // Replace atomically so the broker never reads a partial file
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, json).map_err(write_error)?;
        std::fs::rename(&staging, &self.path).map_err(write_error)
    }
}

impl CredentialProvisioner for JsonFileProvisioner {
    fn ensure(&self, record: &AuthRecord) -> Result<(), ProvisionError> {
        let mut records = self.records()?;

        match records
            .iter_mut()
            .find(|existing| existing.identifier == record.identifier)
        {
            Some(existing) if existing == record => {
                tracing::debug!(identifier = %record.identifier, "Credentials already provisioned");
                return Ok(());
            }
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }

        self.write(&records)?;
        tracing::info!(
            identifier = %record.identifier,
            path = %self.path.display(),
            channels = record.subscribe.len(),
            "Provisioned credentials"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(secret: &str) -> AuthRecord {
        AuthRecord::subscriber(
            "collector",
            secret,
            &["dionaea.capture".to_string(), "kippo.sessions".to_string()],
        )
    }

    #[test]
    fn test_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = JsonFileProvisioner::new(dir.path().join("auth_keys.json"));

        provisioner.ensure(&record("s1")).unwrap();

        let records = provisioner.records().unwrap();
        assert_eq!(records, vec![record("s1")]);
        assert!(records[0].publish.is_empty());
        assert!(!dir.path().join("auth_keys.tmp").exists());
    }

    #[test]
    fn test_upsert_replaces_same_identifier_and_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth_keys.json");
        let other = AuthRecord {
            identifier: "dionaea-1".to_string(),
            secret: "d".to_string(),
            publish: vec!["dionaea.capture".to_string()],
            subscribe: Vec::new(),
        };
        std::fs::write(&path, serde_json::to_string(&vec![other.clone(), record("old")]).unwrap())
            .unwrap();

        let provisioner = JsonFileProvisioner::new(&path);
        provisioner.ensure(&record("new")).unwrap();

        assert_eq!(provisioner.records().unwrap(), vec![other, record("new")]);
    }

    #[test]
    fn test_stored_document_uses_auth_key_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth_keys.json");
        JsonFileProvisioner::new(&path).ensure(&record("s1")).unwrap();

        let stored: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            stored,
            serde_json::json!([{
                "identifier": "collector",
                "secret": "s1",
                "publish": [],
                "subscribe": ["dionaea.capture", "kippo.sessions"]
            }])
        );
    }

    #[test]
    fn test_corrupt_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth_keys.json");
        std::fs::write(&path, "{\"identifier\": 1}").unwrap();

        let error = JsonFileProvisioner::new(&path).ensure(&record("s")).unwrap_err();
        assert!(matches!(error, ProvisionError::Parse { .. }));
        // Left untouched
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"identifier\": 1}");
    }

    #[test]
    fn test_empty_file_is_empty_store() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let provisioner = JsonFileProvisioner::new(file.path());
        assert!(provisioner.records().unwrap().is_empty());
    }
}
