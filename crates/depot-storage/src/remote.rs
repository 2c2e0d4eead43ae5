// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! Remote HTTP-addressable store driver.
//!
//! Objects live on a store Depot does not manage; the driver resolves them
//! under a configured base URL and reads them over HTTP. The store is
//! read-only from Depot's side: every mutating operation fails as
//! unsupported, as does listing (plain HTTP has no directory protocol).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use depot_core::config::{StoreConfig, StoreKind};
use depot_core::types::LogicalObject;
use depot_core::{Error, Result};
use futures::TryStreamExt;
use reqwest::StatusCode;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::driver::StorageDriver;
use crate::stream::ObjectReader;

/// Timeout applied to every HTTP request. The storage core itself has no
/// deadline handling; this client-level timeout is the backstop.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Reads objects from a remote HTTP-addressable store.
#[derive(Debug)]
pub struct RemoteDriver {
    driver_id: String,
    base_url: String,
    client: reqwest::Client,
    config: StoreConfig,
}

impl RemoteDriver {
    /// Creates a driver resolving objects under the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL is configured or the HTTP client
    /// cannot be built.
    pub fn new(driver_id: impl Into<String>, config: StoreConfig) -> Result<Self> {
        let driver_id = driver_id.into();
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| {
                Error::Config(format!("store '{driver_id}' has no base_url configured"))
            })?
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| Error::Remote(err.to_string()))?;

        Ok(Self {
            driver_id,
            base_url,
            client,
            config,
        })
    }

    fn url_for(&self, object: &LogicalObject, tag: Option<&str>) -> Result<String> {
        match tag {
            None => Ok(format!("{}/{}", self.base_url, object.storage_location)),
            Some(tag) if tag.is_empty() || tag.contains('/') => {
                Err(Error::InvalidLocation(format!("auxiliary tag '{tag}'")))
            }
            Some(tag) => Ok(format!(
                "{}/{}.{tag}",
                self.base_url, object.storage_location
            )),
        }
    }

    async fn get(&self, url: &str) -> Result<ObjectReader> {
        debug!(driver = %self.driver_id, url, "fetching remote object");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Error::Remote(err.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::DoesNotExist(format!("remote object at {url}")));
        }
        let resp = resp
            .error_for_status()
            .map_err(|err| Error::Remote(err.to_string()))?;

        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(ObjectReader::new(Box::new(StreamReader::new(Box::pin(
            stream,
        )))))
    }

    async fn head(&self, url: &str) -> Result<Option<u64>> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|err| Error::Remote(err.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .map_err(|err| Error::Remote(err.to_string()))?;
        Ok(Some(resp.content_length().unwrap_or(0)))
    }

    fn read_only(&self, operation: &'static str) -> Error {
        Error::unsupported(operation, self.kind().as_str())
    }
}

#[async_trait]
impl StorageDriver for RemoteDriver {
    fn driver_id(&self) -> &str {
        &self.driver_id
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Remote
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn open_read(&self, object: &LogicalObject) -> Result<ObjectReader> {
        self.get(&self.url_for(object, None)?).await
    }

    async fn exists(&self, object: &LogicalObject) -> Result<bool> {
        Ok(self.head(&self.url_for(object, None)?).await?.is_some())
    }

    async fn delete(&self, _object: &LogicalObject) -> Result<()> {
        Err(self.read_only("delete"))
    }

    async fn size(&self, object: &LogicalObject) -> Result<u64> {
        let url = self.url_for(object, None)?;
        self.head(&url)
            .await?
            .ok_or_else(|| Error::DoesNotExist(format!("remote object at {url}")))
    }

    async fn save_path(&self, _object: &LogicalObject, _source: &Path) -> Result<u64> {
        Err(self.read_only("save_path"))
    }

    async fn list_aux_objects(&self, _object: &LogicalObject) -> Result<Vec<String>> {
        Err(self.read_only("list_aux_objects"))
    }

    async fn is_aux_cached(&self, object: &LogicalObject, tag: &str) -> Result<bool> {
        Ok(self.head(&self.url_for(object, Some(tag))?).await?.is_some())
    }

    async fn open_aux_read(&self, object: &LogicalObject, tag: &str) -> Result<ObjectReader> {
        self.get(&self.url_for(object, Some(tag))?).await
    }

    async fn aux_size(&self, object: &LogicalObject, tag: &str) -> Result<u64> {
        let url = self.url_for(object, Some(tag))?;
        self.head(&url)
            .await?
            .ok_or_else(|| Error::DoesNotExist(format!("remote object at {url}")))
    }

    async fn save_path_as_aux(
        &self,
        _object: &LogicalObject,
        _source: &Path,
        _tag: &str,
    ) -> Result<()> {
        Err(self.read_only("save_path_as_aux"))
    }

    async fn save_stream_as_aux(
        &self,
        _object: &LogicalObject,
        _reader: ObjectReader,
        _tag: &str,
        _known_length: Option<u64>,
    ) -> Result<u64> {
        Err(self.read_only("save_stream_as_aux"))
    }

    async fn delete_aux_object(&self, _object: &LogicalObject, _tag: &str) -> Result<()> {
        Err(self.read_only("delete_aux_object"))
    }

    async fn delete_all_aux_objects(&self, _object: &LogicalObject) -> Result<()> {
        Err(self.read_only("delete_all_aux_objects"))
    }

    async fn revert_backup_as_aux(&self, _object: &LogicalObject, _tag: &str) -> Result<()> {
        Err(self.read_only("revert_backup_as_aux"))
    }

    fn remote_url(&self, object: &LogicalObject) -> Option<String> {
        self.url_for(object, None).ok()
    }

    fn remote_store_name(&self) -> Option<String> {
        self.config
            .label
            .clone()
            .or_else(|| Some(self.driver_id.clone()))
    }

    fn remote_store_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
