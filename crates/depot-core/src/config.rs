//! Configuration management for Depot stores.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration for Depot.
///
/// Stores are keyed by driver identifier; the identifier selects both the
/// backend implementation and the configuration table that applies to it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Store configurations, keyed by driver identifier.
    pub stores: HashMap<String, StoreConfig>,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::Error::Io)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed.
    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Looks up the store configured under a driver identifier.
    #[must_use]
    pub fn store(&self, driver_id: &str) -> Option<&StoreConfig> {
        self.stores.get(driver_id)
    }
}

/// Which backend implementation a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Local filesystem.
    #[default]
    File,
    /// S3-compatible object store.
    S3,
    /// Remote HTTP-addressable store.
    Remote,
}

impl StoreKind {
    /// Returns the kind as a configuration string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::S3 => "s3",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for a single store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend implementation for this store.
    pub kind: StoreKind,
    /// Human-readable label, surfaced as the remote store name.
    pub label: Option<String>,

    /// Root directory for object data (file stores).
    pub directory: Option<PathBuf>,

    /// Bucket name (s3 stores).
    pub bucket: Option<String>,
    /// Custom endpoint URL (s3 stores; defaults to AWS).
    pub endpoint: Option<String>,
    /// Region (s3 stores).
    pub region: Option<String>,
    /// Use path-style addressing instead of virtual-hosted style (s3 stores).
    pub path_style_access: bool,
    /// Whether presigned direct-download URLs may be handed to clients
    /// (s3 stores).
    pub download_redirect: bool,

    /// Base URL objects are resolved under (remote stores).
    pub base_url: Option<String>,

    /// Whether data in this store is reachable by third parties outside
    /// Depot's own access control. Advisory only; consumed to warn users
    /// before granting restricted access, never to block an operation.
    pub public: bool,
    /// Maximum size in bytes eligible for tabular ingest.
    /// -1 means unlimited.
    pub ingest_size_limit: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            label: None,
            directory: None,
            bucket: None,
            endpoint: None,
            region: None,
            path_style_access: false,
            download_redirect: false,
            base_url: None,
            public: false,
            ingest_size_limit: -1,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.stores.is_empty());
        assert_eq!(config.logging.level, "info");

        let store = StoreConfig::default();
        assert_eq!(store.kind, StoreKind::File);
        assert_eq!(store.ingest_size_limit, -1);
        assert!(!store.public);
    }

    #[test]
    fn test_parse_stores() {
        let config = Config::parse(
            r#"
            [stores.local]
            kind = "file"
            directory = "/var/lib/depot/files"
            ingest_size_limit = 1048576

            [stores.archive]
            kind = "s3"
            bucket = "depot-archive"
            region = "us-east-1"
            path_style_access = true
            public = true

            [stores.trsa]
            kind = "remote"
            label = "Trusted Remote"
            base_url = "https://data.example.org/objects"
            "#,
        )
        .unwrap();

        let local = config.store("local").unwrap();
        assert_eq!(local.kind, StoreKind::File);
        assert_eq!(local.ingest_size_limit, 1_048_576);
        assert!(!local.public);

        let archive = config.store("archive").unwrap();
        assert_eq!(archive.kind, StoreKind::S3);
        assert_eq!(archive.bucket.as_deref(), Some("depot-archive"));
        assert!(archive.path_style_access);
        assert!(archive.public);

        let trsa = config.store("trsa").unwrap();
        assert_eq!(trsa.kind, StoreKind::Remote);
        assert_eq!(trsa.label.as_deref(), Some("Trusted Remote"));

        assert!(config.store("nope").is_none());
    }

    #[test]
    fn test_parse_rejects_bad_kind() {
        let result = Config::parse(
            r#"
            [stores.local]
            kind = "tape"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("depot.toml");
        std::fs::write(&path, "[stores.local]\nkind = \"file\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.store("local").is_some());
    }
}
