// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! The preservation-version lifecycle.
//!
//! When a file undergoes a transformation such as tabular ingest, the derived
//! copy is promoted to "preservation" status. Two on-disk conventions are in
//! the wild:
//!
//! - **Legacy**: the original was relocated to a `.orig` auxiliary and the
//!   main location holds the transformed copy.
//! - **Current**: the main location keeps the original untouched and the
//!   transformed copy is stored as a `.preservation` auxiliary. This avoids
//!   rewriting large main-content objects in object stores.
//!
//! The read accessors below resolve either convention, so callers never need
//! to know which one applies to a given object.
//!
//! The check-then-act sequences here are not atomic against a concurrent
//! writer on the same logical object; callers must serialize
//! preservation-version mutations per object.

use std::path::Path;
use std::sync::Arc;

use depot_core::types::FileCopy;
use depot_core::{Error, Result, INGEST_AUX_TAGS};
use tracing::debug;

use crate::handle::StorageHandle;
use crate::stream::ObjectReader;

impl StorageHandle {
    /// Promotes the file at `source` to this object's preservation copy,
    /// stored as the `.preservation` auxiliary (the current convention).
    ///
    /// # Errors
    ///
    /// Fails with [`Error::AlreadyExists`] if a `.orig` or `.preservation`
    /// auxiliary is already cached: an existing preservation version is never
    /// silently overwritten.
    pub async fn add_preservation_version(&mut self, source: &Path) -> Result<()> {
        let orig = FileCopy::Original.extension();
        let preservation = FileCopy::Preservation.extension();

        if self.is_aux_object_cached(orig).await? || self.is_aux_object_cached(preservation).await?
        {
            return Err(Error::AlreadyExists("preservation version".to_string()));
        }
        self.save_path_as_aux(source, preservation).await
    }

    /// Rolls this object back to its pre-ingest state, under either
    /// convention.
    ///
    /// With a `.orig` auxiliary present (legacy), the main content is
    /// restored from it first; either way every ingest-derived auxiliary
    /// (`preservation`, `prep`, `RSpace`, `tab`) that is present is deleted.
    /// The main content is left untouched under the current convention, since
    /// it already holds the original.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DoesNotExist`] if neither a `.orig` nor a
    /// `.preservation` auxiliary is cached.
    pub async fn remove_preservation_version(&mut self) -> Result<()> {
        let orig_exists = self
            .is_aux_object_cached(FileCopy::Original.extension())
            .await?;
        let preservation_exists = self
            .is_aux_object_cached(FileCopy::Preservation.extension())
            .await?;

        if !orig_exists && !preservation_exists {
            return Err(Error::DoesNotExist("preservation version".to_string()));
        }

        if orig_exists {
            debug!(
                driver = self.driver_id(),
                location = %self.object().storage_location,
                "restoring original from legacy .orig auxiliary"
            );
            self.revert_backup_as_aux(FileCopy::Original.extension())
                .await?;
        }
        self.delete_ingest_files().await
    }

    /// Deletes whichever ingest-derived auxiliaries are present.
    async fn delete_ingest_files(&mut self) -> Result<()> {
        let present = self.list_aux_objects().await?;
        for tag in INGEST_AUX_TAGS {
            if present.iter().any(|t| t == tag) {
                self.delete_aux_object(tag).await?;
            }
        }
        Ok(())
    }

    /// Opens the best available rendering of this object: the preservation
    /// copy if one exists, otherwise the main content.
    ///
    /// Equivalent to `content_reader_for(FileCopy::Preservation)`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn content_reader(&mut self) -> Result<ObjectReader> {
        self.content_reader_for(FileCopy::Preservation).await
    }

    /// Opens the requested rendering of this object, resolving both on-disk
    /// conventions:
    ///
    /// - `Preservation`: the `.preservation` auxiliary if cached, else the
    ///   main content (which holds the preservation copy under the legacy
    ///   convention, and the only copy when no ingest ever happened).
    /// - `Original`: the `.orig` auxiliary if cached (legacy), else the main
    ///   content. An explicit request for the original always yields the true
    ///   pre-ingest bytes, never the preservation copy.
    ///
    /// If a main reader is already bound (via `open`), a main-content result
    /// takes that reader; otherwise a fresh one is opened.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn content_reader_for(&mut self, copy: FileCopy) -> Result<ObjectReader> {
        let tag = copy.extension();
        if self.is_aux_object_cached(tag).await? {
            return self.aux_reader(tag).await;
        }
        self.main_content_reader().await
    }

    async fn main_content_reader(&mut self) -> Result<ObjectReader> {
        if let Some(reader) = self.take_input_stream() {
            return Ok(reader);
        }
        let driver = Arc::clone(self.driver());
        driver.open_read(self.object()).await
    }
}
