// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! The storage driver contract.
//!
//! Every backend (local filesystem, object store, remote HTTP store)
//! implements this one trait. Main content and auxiliary content share one
//! tag-addressed shape (auxiliaries live at `<main-location>.<tag>`), with
//! main content as the zero-tag case, so the preservation layer stays
//! backend-agnostic.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use depot_core::config::{StoreConfig, StoreKind};
use depot_core::types::LogicalObject;
use depot_core::{driver_prefix, Error, Result};

use crate::stream::{ObjectReader, ObjectWriter};

/// Trait for storage backends.
///
/// All operations may fail with a backend I/O error; callers must treat
/// failures as non-retryable, since retry policy depends on backend semantics
/// this contract does not know. A backend that cannot support an operation
/// must fail with [`Error::Unsupported`] rather than silently no-op; the
/// default bodies below do exactly that.
#[async_trait]
pub trait StorageDriver: Send + Sync + 'static {
    /// The driver identifier this instance was configured under.
    fn driver_id(&self) -> &str;

    /// Which backend family this driver belongs to.
    fn kind(&self) -> StoreKind;

    /// The configuration this driver was built from.
    fn config(&self) -> &StoreConfig;

    /// Whether objects live on a local filesystem.
    fn is_local(&self) -> bool {
        false
    }

    // Main content operations

    /// The fully-qualified addressing string for an object,
    /// `"<driverId>://<location>"`.
    fn storage_location(&self, object: &LogicalObject) -> String {
        format!(
            "{}{}",
            driver_prefix(self.driver_id()),
            object.storage_location
        )
    }

    /// The filesystem path of the main content.
    ///
    /// # Errors
    ///
    /// Fails as unsupported for backends with no filesystem mapping.
    fn file_system_path(&self, _object: &LogicalObject) -> Result<PathBuf> {
        Err(Error::unsupported("file_system_path", self.kind().as_str()))
    }

    /// Opens the main content for reading.
    async fn open_read(&self, object: &LogicalObject) -> Result<ObjectReader>;

    /// Opens the main content for writing.
    ///
    /// # Errors
    ///
    /// Fails as unsupported for backends that cannot stream writes of
    /// unknown length (object stores).
    async fn open_write(&self, _object: &LogicalObject) -> Result<ObjectWriter> {
        Err(Error::unsupported("open_write", self.kind().as_str()))
    }

    /// Whether the main content exists.
    async fn exists(&self, object: &LogicalObject) -> Result<bool>;

    /// Removes the main content. Deleting a non-existent object is not an
    /// error.
    async fn delete(&self, object: &LogicalObject) -> Result<()>;

    /// Size of the main content in bytes.
    async fn size(&self, object: &LogicalObject) -> Result<u64>;

    /// Copies a local filesystem path in as the new main content
    /// (copy semantics, not move). Returns the number of bytes stored.
    async fn save_path(&self, object: &LogicalObject, source: &Path) -> Result<u64>;

    // Auxiliary object operations, all tag-addressed

    /// Tags of all auxiliary objects currently stored for this object.
    async fn list_aux_objects(&self, object: &LogicalObject) -> Result<Vec<String>>;

    /// Whether the auxiliary object under `tag` exists.
    async fn is_aux_cached(&self, object: &LogicalObject, tag: &str) -> Result<bool>;

    /// Opens the auxiliary object under `tag` for reading.
    async fn open_aux_read(&self, object: &LogicalObject, tag: &str) -> Result<ObjectReader>;

    /// Opens the auxiliary object under `tag` for writing.
    ///
    /// # Errors
    ///
    /// Fails as unsupported for backends that cannot stream writes of
    /// unknown length.
    async fn open_aux_write(&self, _object: &LogicalObject, _tag: &str) -> Result<ObjectWriter> {
        Err(Error::unsupported("open_aux_write", self.kind().as_str()))
    }

    /// Size of the auxiliary object under `tag`, in bytes.
    async fn aux_size(&self, object: &LogicalObject, tag: &str) -> Result<u64>;

    /// The filesystem path of the auxiliary object under `tag`.
    ///
    /// # Errors
    ///
    /// Fails as unsupported for backends with no filesystem mapping.
    fn aux_file_system_path(&self, _object: &LogicalObject, _tag: &str) -> Result<PathBuf> {
        Err(Error::unsupported(
            "aux_file_system_path",
            self.kind().as_str(),
        ))
    }

    /// Copies a local filesystem path in as the auxiliary object under `tag`.
    async fn save_path_as_aux(
        &self,
        object: &LogicalObject,
        source: &Path,
        tag: &str,
    ) -> Result<()>;

    /// Stores a stream as the auxiliary object under `tag`. Returns the
    /// number of bytes stored.
    ///
    /// `known_length` exists so backends that cannot stream unknown-length
    /// payloads (object stores) can avoid buffering the entire payload first;
    /// backends that support true streaming ignore it.
    async fn save_stream_as_aux(
        &self,
        object: &LogicalObject,
        reader: ObjectReader,
        tag: &str,
        known_length: Option<u64>,
    ) -> Result<u64>;

    /// Removes the auxiliary object under `tag`. Deleting a non-existent
    /// auxiliary is not an error.
    async fn delete_aux_object(&self, object: &LogicalObject, tag: &str) -> Result<()>;

    /// Removes every auxiliary object stored for this object.
    async fn delete_all_aux_objects(&self, object: &LogicalObject) -> Result<()>;

    /// Restores the main content from the auxiliary object under `tag`,
    /// consuming the auxiliary. Used for rollback.
    async fn revert_backup_as_aux(&self, object: &LogicalObject, tag: &str) -> Result<()>;

    // Remote metadata hooks

    /// URL the main content resolves to, for remote-backed objects.
    fn remote_url(&self, _object: &LogicalObject) -> Option<String> {
        None
    }

    /// Human-readable name of the remote store, for remote-backed objects.
    fn remote_store_name(&self) -> Option<String> {
        None
    }

    /// Base URL of the remote store, for remote-backed objects.
    fn remote_store_url(&self) -> Option<String> {
        None
    }

    // Direct download

    /// Whether clients may be redirected to the backend for downloads.
    fn download_redirect_enabled(&self) -> bool {
        false
    }

    /// Produces a short-lived URL a client can fetch the content from
    /// directly. `tag` selects an auxiliary object; `None` selects the main
    /// content.
    ///
    /// # Errors
    ///
    /// Fails as unsupported unless the backend enables direct download.
    async fn temporary_download_url(
        &self,
        _object: &LogicalObject,
        _tag: Option<&str>,
        _content_type: Option<&str>,
        _file_name: Option<&str>,
    ) -> Result<String> {
        Err(Error::unsupported(
            "temporary_download_url",
            self.kind().as_str(),
        ))
    }
}
