// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! Common types used throughout Depot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator between a driver identifier and the driver-specific part of a
/// fully-qualified storage location, e.g. `local://2026/08/f4a1b2`.
///
/// External collaborators composing or parsing location strings must use this
/// exact value.
pub const DRIVER_SEPARATOR: &str = "://";

/// Auxiliary tags produced by tabular ingest.
///
/// These are reserved system-wide; removing a preservation version sweeps
/// exactly this set.
pub const INGEST_AUX_TAGS: [&str; 4] = ["preservation", "prep", "RSpace", "tab"];

/// Returns the location prefix for a driver, e.g. `"local://"`.
#[must_use]
pub fn driver_prefix(driver_id: &str) -> String {
    format!("{driver_id}{DRIVER_SEPARATOR}")
}

/// Which rendering of an ingested file a read should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCopy {
    /// The pre-ingest original bytes.
    Original,
    /// The canonical post-ingest preservation copy.
    Preservation,
}

impl FileCopy {
    /// The auxiliary-tag extension under which this copy is stored when it is
    /// not at the main location.
    ///
    /// Pre-transition ("legacy") layouts relocate the original to a `.orig`
    /// auxiliary; post-transition layouts add the preservation copy as a
    /// `.preservation` auxiliary and leave the original in place.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Original => "orig",
            Self::Preservation => "preservation",
        }
    }
}

/// What kind of domain entity a logical object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A single data file.
    DataFile,
    /// A dataset (a container of data files).
    Dataset,
    /// A collection of datasets.
    Collection,
}

/// Identifies the thing being stored.
///
/// Owned by the calling domain layer: the storage core never creates or
/// destroys logical objects, it only reads identity/size/mime metadata and,
/// when relevant, writes size and mime back through the handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalObject {
    /// Opaque identity.
    pub id: Uuid,
    /// What kind of entity this is.
    pub kind: ObjectKind,
    /// Selects the backend and its configuration namespace.
    pub driver_id: String,
    /// Driver-specific addressing string (relative path, object key, ...).
    pub storage_location: String,
    /// Last known size in bytes, if the domain layer has one.
    pub size: Option<u64>,
    /// MIME type, if known.
    pub content_type: Option<String>,
    /// User-visible file name, if known.
    pub file_name: Option<String>,
}

impl LogicalObject {
    /// Creates a new logical object bound to a driver and location.
    #[must_use]
    pub fn new(
        kind: ObjectKind,
        driver_id: impl Into<String>,
        storage_location: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            driver_id: driver_id.into(),
            storage_location: storage_location.into(),
            size: None,
            content_type: None,
            file_name: None,
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// The fully-qualified location string, `"<driverId>://<location>"`.
    #[must_use]
    pub fn qualified_location(&self) -> String {
        format!("{}{}", driver_prefix(&self.driver_id), self.storage_location)
    }
}

/// Caller context for a storage operation.
///
/// Constructed per call, immutable, discarded after the call completes. Used
/// by auditing/authorization hooks outside this core.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// Identity of the caller, if known.
    pub caller: Option<String>,
    /// Auxiliary headers carried along with the request.
    pub headers: HashMap<String, String>,
    /// When the request was constructed.
    pub issued_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Creates a request on behalf of a named caller.
    #[must_use]
    pub fn for_caller(caller: impl Into<String>) -> Self {
        Self {
            caller: Some(caller.into()),
            ..Self::default()
        }
    }

    /// Attaches an auxiliary header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl Default for AccessRequest {
    /// The empty context, used when no request is supplied.
    fn default() -> Self {
        Self {
            caller: None,
            headers: HashMap::new(),
            issued_at: Utc::now(),
        }
    }
}

/// Options accepted by `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOption {
    /// Open the main content for reading.
    ReadAccess,
    /// Open the main content for writing.
    WriteAccess,
}

/// Determines the access mode from an option set.
///
/// The first explicit option wins; with no options the handle opens in read
/// mode. There is no read-write mode.
#[must_use]
pub fn write_access_requested(options: &[AccessOption]) -> bool {
    for option in options {
        match option {
            AccessOption::ReadAccess => return false,
            AccessOption::WriteAccess => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_prefix() {
        assert_eq!(driver_prefix("local"), "local://");
        assert_eq!(driver_prefix("s3-archive"), "s3-archive://");
    }

    #[test]
    fn test_file_copy_extensions() {
        assert_eq!(FileCopy::Original.extension(), "orig");
        assert_eq!(FileCopy::Preservation.extension(), "preservation");
        assert!(INGEST_AUX_TAGS.contains(&FileCopy::Preservation.extension()));
        assert!(!INGEST_AUX_TAGS.contains(&FileCopy::Original.extension()));
    }

    #[test]
    fn test_qualified_location() {
        let object = LogicalObject::new(ObjectKind::DataFile, "local", "2026/08/f4a1b2");
        assert_eq!(object.qualified_location(), "local://2026/08/f4a1b2");
    }

    #[test]
    fn test_access_request_default_is_empty() {
        let req = AccessRequest::default();
        assert!(req.caller.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_write_access_requested() {
        assert!(!write_access_requested(&[]));
        assert!(!write_access_requested(&[AccessOption::ReadAccess]));
        assert!(write_access_requested(&[AccessOption::WriteAccess]));
        // First explicit option wins.
        assert!(!write_access_requested(&[
            AccessOption::ReadAccess,
            AccessOption::WriteAccess
        ]));
    }
}
