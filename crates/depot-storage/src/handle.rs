// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! The live storage session bound to one logical object.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use depot_core::types::{AccessOption, AccessRequest, LogicalObject};
use depot_core::{write_access_requested, Result};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::driver::StorageDriver;
use crate::stream::{ObjectReader, ObjectWriter};

/// Produces the tab-separated header line for a tabular file from an ordered
/// sequence of variable names, terminated by a single newline.
///
/// Returns `None` for an empty sequence.
#[must_use]
pub fn generate_variable_header<S: AsRef<str>>(variables: &[S]) -> Option<String> {
    let mut names = variables.iter();
    let first = names.next()?;

    let mut header = first.as_ref().to_string();
    for name in names {
        header.push('\t');
        header.push_str(name.as_ref());
    }
    header.push('\n');
    Some(header)
}

/// A storage session bound to exactly one logical object and one driver.
///
/// Created per operation, not cached across requests, and used by one logical
/// caller at a time: all stream state is mutated through `&mut self`. A handle
/// is either in read mode or write mode for its main stream, never both;
/// auxiliary operations are independent of the mode. [`open`](Self::open) must
/// be called before main-stream access, and the caller owns stream teardown;
/// a stream that is never closed leaks the backend resource.
pub struct StorageHandle {
    driver: Arc<dyn StorageDriver>,
    object: LogicalObject,
    request: AccessRequest,

    read_access: bool,
    write_access: bool,
    input: Option<ObjectReader>,
    output: Option<ObjectWriter>,

    size: u64,
    content_type: Option<String>,
    file_name: Option<String>,
    var_header: Option<String>,
    error_message: Option<String>,
    no_var_header: bool,

    remote_url: Option<String>,
    remote_store_name: Option<String>,
    remote_store_url: Option<String>,
}

impl StorageHandle {
    /// Creates a fresh, unopened handle. A missing request defaults to the
    /// empty context.
    #[must_use]
    pub fn new(
        driver: Arc<dyn StorageDriver>,
        object: LogicalObject,
        request: Option<AccessRequest>,
    ) -> Self {
        Self {
            driver,
            object,
            request: request.unwrap_or_default(),
            read_access: false,
            write_access: false,
            input: None,
            output: None,
            size: 0,
            content_type: None,
            file_name: None,
            var_header: None,
            error_message: None,
            no_var_header: false,
            remote_url: None,
            remote_store_name: None,
            remote_store_url: None,
        }
    }

    /// Establishes read or write capability for the main content.
    ///
    /// Any option requesting write access opens the handle for writing;
    /// otherwise it opens for reading. In read mode the main reader is bound
    /// and the size is refreshed from the backend; in write mode the main
    /// writer is bound. Mime type and file name are seeded from the logical
    /// object either way.
    ///
    /// # Errors
    ///
    /// Propagates the backend failure; unsupported write access surfaces here.
    pub async fn open(&mut self, options: &[AccessOption]) -> Result<()> {
        debug!(
            driver = self.driver.driver_id(),
            location = %self.object.storage_location,
            "opening storage handle"
        );

        if write_access_requested(options) {
            let writer = self.driver.open_write(&self.object).await?;
            self.output = Some(writer);
            self.input = None;
            self.write_access = true;
            self.read_access = false;
        } else {
            let reader = self.driver.open_read(&self.object).await?;
            self.size = self.driver.size(&self.object).await?;
            self.input = Some(reader);
            self.output = None;
            self.read_access = true;
            self.write_access = false;
        }

        if self.content_type.is_none() {
            self.content_type = self.object.content_type.clone();
        }
        if self.file_name.is_none() {
            self.file_name = self.object.file_name.clone();
        }
        self.remote_url = self.driver.remote_url(&self.object);
        self.remote_store_name = self.driver.remote_store_name();
        self.remote_store_url = self.driver.remote_store_url();

        Ok(())
    }

    // Mode and identity

    /// Whether the handle is open in read mode.
    #[must_use]
    pub fn can_read(&self) -> bool {
        self.read_access
    }

    /// Whether the handle is open in write mode.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.write_access
    }

    /// The logical object this handle is bound to.
    #[must_use]
    pub fn object(&self) -> &LogicalObject {
        &self.object
    }

    /// The caller context for this session.
    #[must_use]
    pub fn request(&self) -> &AccessRequest {
        &self.request
    }

    /// The driver identifier this handle operates under.
    #[must_use]
    pub fn driver_id(&self) -> &str {
        self.driver.driver_id()
    }

    /// Whether the bound object lives on a local filesystem.
    #[must_use]
    pub fn is_local_file(&self) -> bool {
        self.driver.is_local()
    }

    // Main streams

    /// The bound main reader, if the handle is open in read mode.
    pub fn input_stream(&mut self) -> Option<&mut ObjectReader> {
        self.input.as_mut()
    }

    /// Takes ownership of the bound main reader, if any.
    pub fn take_input_stream(&mut self) -> Option<ObjectReader> {
        self.input.take()
    }

    /// Binds a main reader directly, bypassing `open`. Drivers whose reads
    /// are produced out-of-band use this; so do tests.
    pub fn set_main_input_stream(&mut self, reader: ObjectReader) {
        self.input = Some(reader);
    }

    /// The bound main writer, if the handle is open in write mode.
    pub fn output_stream(&mut self) -> Option<&mut ObjectWriter> {
        self.output.as_mut()
    }

    /// Releases the bound main reader.
    ///
    /// Never fails: an I/O failure while closing is swallowed and recorded in
    /// the error-message field, prepended to any pre-existing message with a
    /// `"; "` separator, so close failures stay observable without
    /// disrupting caller control flow.
    pub fn close_input_stream(&mut self) {
        if let Some(reader) = self.input.take() {
            if let Err(err) = reader.close() {
                let warning = format!("Warning: I/O error closing input stream: {err}");
                self.error_message = Some(match self.error_message.take() {
                    Some(existing) => format!("{warning}; {existing}"),
                    None => warning,
                });
            }
        }
    }

    /// Flushes and releases the bound main writer.
    ///
    /// # Errors
    ///
    /// Unlike reader close, a failure to complete a write is an
    /// operation-defining error and propagates.
    pub async fn close_output_stream(&mut self) -> Result<()> {
        if let Some(mut writer) = self.output.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }

    // Cached metadata

    /// Cached size of the main content, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Sets the cached size.
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// MIME type of the content, if known.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Sets the MIME type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    /// User-visible file name, if known.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Sets the file name.
    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = Some(file_name.into());
    }

    /// Tab-separated variable header for tabular content, if set.
    #[must_use]
    pub fn var_header(&self) -> Option<&str> {
        self.var_header.as_deref()
    }

    /// Sets the variable header.
    pub fn set_var_header(&mut self, var_header: impl Into<String>) {
        self.var_header = Some(var_header.into());
    }

    /// Whether reads of this tabular file should omit the variable header.
    #[must_use]
    pub fn no_var_header(&self) -> bool {
        self.no_var_header
    }

    /// Sets the no-variable-header flag.
    pub fn set_no_var_header(&mut self, no_var_header: bool) {
        self.no_var_header = no_var_header;
    }

    /// Diagnostic state accumulated on this handle, including swallowed
    /// stream-close failures.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Sets the diagnostic message.
    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// URL the main content resolves to, for remote-backed objects.
    #[must_use]
    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    /// Sets the remote URL.
    pub fn set_remote_url(&mut self, url: impl Into<String>) {
        self.remote_url = Some(url.into());
    }

    /// Human-readable name of the remote store, for remote-backed objects.
    #[must_use]
    pub fn remote_store_name(&self) -> Option<&str> {
        self.remote_store_name.as_deref()
    }

    /// Base URL of the remote store, for remote-backed objects.
    #[must_use]
    pub fn remote_store_url(&self) -> Option<&str> {
        self.remote_store_url.as_deref()
    }

    /// Whether the cached size is within the per-store ingest limit.
    ///
    /// Returns false exactly when a positive limit is configured and the
    /// size exceeds it; a limit of -1 means unlimited.
    #[must_use]
    pub fn is_below_ingest_size_limit(&self) -> bool {
        let limit = self.driver.config().ingest_size_limit;
        !(limit > 0 && self.size > limit as u64)
    }

    // Contract passthroughs, bound to this handle's object

    /// The fully-qualified addressing string for the bound object.
    #[must_use]
    pub fn storage_location(&self) -> String {
        self.driver.storage_location(&self.object)
    }

    /// The filesystem path of the main content.
    ///
    /// # Errors
    ///
    /// Fails as unsupported when the backend has no filesystem mapping.
    pub fn file_system_path(&self) -> Result<PathBuf> {
        self.driver.file_system_path(&self.object)
    }

    /// Whether the main content exists.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn exists(&self) -> Result<bool> {
        self.driver.exists(&self.object).await
    }

    /// Removes the main content. Deleting a non-existent object is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn delete(&mut self) -> Result<()> {
        self.driver.delete(&self.object).await
    }

    /// Copies a local filesystem path in as the new main content and updates
    /// the cached size.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn save_path(&mut self, source: &Path) -> Result<()> {
        let stored = self.driver.save_path(&self.object, source).await?;
        self.size = stored;
        Ok(())
    }

    /// Tags of all auxiliary objects currently stored for the bound object.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn list_aux_objects(&self) -> Result<Vec<String>> {
        self.driver.list_aux_objects(&self.object).await
    }

    /// Whether the auxiliary object under `tag` exists.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn is_aux_object_cached(&self, tag: &str) -> Result<bool> {
        self.driver.is_aux_cached(&self.object, tag).await
    }

    /// Opens the auxiliary object under `tag` for reading.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn aux_reader(&self, tag: &str) -> Result<ObjectReader> {
        self.driver.open_aux_read(&self.object, tag).await
    }

    /// Opens the auxiliary object under `tag` for writing.
    ///
    /// # Errors
    ///
    /// Fails as unsupported for backends that cannot stream writes.
    pub async fn aux_writer(&self, tag: &str) -> Result<ObjectWriter> {
        self.driver.open_aux_write(&self.object, tag).await
    }

    /// Size of the auxiliary object under `tag`, in bytes.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn aux_size(&self, tag: &str) -> Result<u64> {
        self.driver.aux_size(&self.object, tag).await
    }

    /// The filesystem path of the auxiliary object under `tag`.
    ///
    /// # Errors
    ///
    /// Fails as unsupported when the backend has no filesystem mapping.
    pub fn aux_file_system_path(&self, tag: &str) -> Result<PathBuf> {
        self.driver.aux_file_system_path(&self.object, tag)
    }

    /// Copies a local filesystem path in as the auxiliary object under `tag`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn save_path_as_aux(&mut self, source: &Path, tag: &str) -> Result<()> {
        self.driver.save_path_as_aux(&self.object, source, tag).await
    }

    /// Stores a stream as the auxiliary object under `tag`; see
    /// [`StorageDriver::save_stream_as_aux`] for the length hint.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn save_stream_as_aux(
        &mut self,
        reader: ObjectReader,
        tag: &str,
        known_length: Option<u64>,
    ) -> Result<u64> {
        self.driver
            .save_stream_as_aux(&self.object, reader, tag, known_length)
            .await
    }

    /// Removes the auxiliary object under `tag`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn delete_aux_object(&mut self, tag: &str) -> Result<()> {
        self.driver.delete_aux_object(&self.object, tag).await
    }

    /// Removes every auxiliary object stored for the bound object.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn delete_all_aux_objects(&mut self) -> Result<()> {
        self.driver.delete_all_aux_objects(&self.object).await
    }

    /// Restores the main content from the auxiliary object under `tag`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn revert_backup_as_aux(&mut self, tag: &str) -> Result<()> {
        self.driver.revert_backup_as_aux(&self.object, tag).await
    }

    /// Whether clients may be redirected to the backend for downloads.
    #[must_use]
    pub fn download_redirect_enabled(&self) -> bool {
        self.driver.download_redirect_enabled()
    }

    /// Produces a short-lived direct-download URL; see
    /// [`StorageDriver::temporary_download_url`].
    ///
    /// # Errors
    ///
    /// Fails as unsupported unless the backend enables direct download.
    pub async fn temporary_download_url(
        &self,
        tag: Option<&str>,
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<String> {
        self.driver
            .temporary_download_url(&self.object, tag, content_type, file_name)
            .await
    }

    pub(crate) fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }
}

impl std::fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandle")
            .field("driver_id", &self.driver.driver_id())
            .field("location", &self.object.storage_location)
            .field("read_access", &self.read_access)
            .field("write_access", &self.write_access)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use depot_core::config::StoreConfig;
    use depot_core::types::ObjectKind;
    use tempfile::TempDir;

    use super::*;
    use crate::file::FileSystemDriver;

    async fn test_handle(config: StoreConfig) -> (StorageHandle, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig {
            directory: Some(temp.path().to_path_buf()),
            ..config
        };
        let driver = FileSystemDriver::new("local", config).await.unwrap();
        let object = LogicalObject::new(ObjectKind::DataFile, "local", "holdings/sample.tab");
        let handle = StorageHandle::new(Arc::new(driver), object, None);
        (handle, temp)
    }

    #[tokio::test]
    async fn test_fresh_handle_state() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        assert!(!handle.can_read());
        assert!(!handle.can_write());
        assert!(handle.input_stream().is_none());
        assert!(handle.output_stream().is_none());
        assert_eq!(handle.size(), 0);
        assert!(handle.content_type().is_none());
        assert!(handle.file_name().is_none());
        assert!(handle.var_header().is_none());
        assert!(handle.error_message().is_none());
        assert!(handle.remote_url().is_none());
        assert!(!handle.no_var_header());
        assert!(handle.request().caller.is_none());
    }

    #[tokio::test]
    async fn test_size_round_trip() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        handle.set_size(0);
        assert_eq!(handle.size(), 0);
        handle.set_size(1);
        assert_eq!(handle.size(), 1);
        handle.set_size(u64::MAX);
        assert_eq!(handle.size(), u64::MAX);
    }

    #[tokio::test]
    async fn test_metadata_accessors() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        handle.set_content_type("text/tab-separated-values");
        assert_eq!(handle.content_type(), Some("text/tab-separated-values"));
        handle.set_file_name("sample.tab");
        assert_eq!(handle.file_name(), Some("sample.tab"));
        handle.set_var_header("A\tB\n");
        assert_eq!(handle.var_header(), Some("A\tB\n"));
        handle.set_error_message("oops");
        assert_eq!(handle.error_message(), Some("oops"));
        handle.set_remote_url("https://data.example.org/x");
        assert_eq!(handle.remote_url(), Some("https://data.example.org/x"));
        handle.set_no_var_header(true);
        assert!(handle.no_var_header());
    }

    #[tokio::test]
    async fn test_close_input_stream_clean() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        handle.set_main_input_stream(ObjectReader::from_bytes(bytes::Bytes::from_static(b"x")));
        handle.close_input_stream();
        assert!(handle.error_message().is_none());
        assert!(handle.input_stream().is_none());

        // Closing with no bound stream is a no-op.
        handle.close_input_stream();
        assert!(handle.error_message().is_none());
    }

    #[tokio::test]
    async fn test_close_input_stream_swallows_failure() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        handle.set_main_input_stream(ObjectReader::with_close(
            Box::new(Cursor::new(Vec::new())),
            || Err(std::io::Error::other("connection reset")),
        ));
        handle.close_input_stream();

        let message = handle.error_message().expect("diagnostic recorded");
        assert!(message.contains("closing input stream"));
        assert!(message.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_close_failure_prepends_to_existing_message() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        handle.set_error_message("earlier failure");
        handle.set_main_input_stream(ObjectReader::with_close(
            Box::new(Cursor::new(Vec::new())),
            || Err(std::io::Error::other("connection reset")),
        ));
        handle.close_input_stream();

        let message = handle.error_message().unwrap();
        let (warning, rest) = message.split_once("; ").unwrap();
        assert!(warning.contains("closing input stream"));
        assert_eq!(rest, "earlier failure");
    }

    #[tokio::test]
    async fn test_generate_variable_header() {
        assert_eq!(generate_variable_header(&["A", "B"]).unwrap(), "A\tB\n");
        assert_eq!(
            generate_variable_header(&["Random", "Random"]).unwrap(),
            "Random\tRandom\n"
        );
        assert_eq!(generate_variable_header(&["only"]).unwrap(), "only\n");
        assert_eq!(generate_variable_header::<&str>(&[]), None);
    }

    #[tokio::test]
    async fn test_ingest_size_limit_unlimited() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        handle.set_size(u64::MAX);
        assert!(handle.is_below_ingest_size_limit());
    }

    #[tokio::test]
    async fn test_ingest_size_limit_enforced() {
        let config = StoreConfig {
            ingest_size_limit: 1000,
            ..StoreConfig::default()
        };
        let (mut handle, _temp) = test_handle(config).await;

        handle.set_size(1000);
        assert!(handle.is_below_ingest_size_limit());
        handle.set_size(1001);
        assert!(!handle.is_below_ingest_size_limit());
    }

    #[tokio::test]
    async fn test_open_read_binds_stream_and_size() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        let source = _temp.path().join("incoming.tab");
        tokio::fs::write(&source, b"id\tvalue\n1\t2\n").await.unwrap();
        handle.save_path(&source).await.unwrap();

        handle.open(&[AccessOption::ReadAccess]).await.unwrap();
        assert!(handle.can_read());
        assert!(!handle.can_write());
        assert_eq!(handle.size(), 13);
        assert!(handle.input_stream().is_some());
        handle.close_input_stream();
    }

    #[tokio::test]
    async fn test_open_write_binds_writer() {
        let (mut handle, _temp) = test_handle(StoreConfig::default()).await;

        handle.open(&[AccessOption::WriteAccess]).await.unwrap();
        assert!(handle.can_write());
        assert!(!handle.can_read());
        assert!(handle.input_stream().is_none());

        let writer = handle.output_stream().unwrap();
        writer.write_all(b"payload").await.unwrap();
        handle.close_output_stream().await.unwrap();

        assert!(handle.exists().await.unwrap());
    }
}
