// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! S3-compatible object store driver.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use depot_core::config::{StoreConfig, StoreKind};
use depot_core::types::LogicalObject;
use depot_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::driver::StorageDriver;
use crate::stream::ObjectReader;

/// How long a presigned direct-download URL stays valid.
const PRESIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Stores objects in an S3-compatible bucket.
///
/// The storage location is the object key; the auxiliary object under `tag`
/// lives at `<key>.<tag>`. Streaming writes of unknown length are not
/// supported: S3 cannot save an object without knowing its length up front,
/// so unknown-length payloads are spooled to a local temp file first.
#[derive(Debug)]
pub struct S3Driver {
    driver_id: String,
    bucket: String,
    client: Client,
    config: StoreConfig,
}

impl S3Driver {
    /// Creates a driver for the configured bucket.
    ///
    /// Endpoint, region and addressing style come from the store
    /// configuration; credentials come from the ambient AWS provider chain.
    ///
    /// # Errors
    ///
    /// Returns an error if no bucket is configured.
    pub async fn new(driver_id: impl Into<String>, config: StoreConfig) -> Result<Self> {
        let driver_id = driver_id.into();
        let bucket = config.bucket.clone().ok_or_else(|| {
            Error::Config(format!("store '{driver_id}' has no bucket configured"))
        })?;

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.path_style_access);
        let client = Client::from_conf(builder.build());

        Ok(Self {
            driver_id,
            bucket,
            client,
            config,
        })
    }

    fn key<'a>(&self, object: &'a LogicalObject) -> &'a str {
        &object.storage_location
    }

    fn aux_key(&self, object: &LogicalObject, tag: &str) -> Result<String> {
        if tag.is_empty() || tag.contains('/') {
            return Err(Error::InvalidLocation(format!("auxiliary tag '{tag}'")));
        }
        Ok(format!("{}.{tag}", object.storage_location))
    }

    async fn head(&self, key: &str) -> Result<Option<u64>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => Ok(Some(resp.content_length().unwrap_or(0).max(0) as u64)),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(service_error("head_object", service_err))
                }
            }
        }
    }

    async fn read(&self, key: &str) -> Result<ObjectReader> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Error::DoesNotExist(format!("object '{key}'"))
                } else {
                    service_error("get_object", service_err)
                }
            })?;

        Ok(stream_body(resp.body))
    }

    async fn put_from_path(
        &self,
        key: &str,
        source: &Path,
        content_type: Option<&str>,
    ) -> Result<u64> {
        let length = tokio::fs::metadata(source).await?.len();
        let body = ByteStream::from_path(source)
            .await
            .map_err(|err| Error::ObjectStore(format!("reading upload source: {err}")))?;

        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(length as i64)
            .body(body);
        if let Some(content_type) = content_type {
            req = req.content_type(content_type);
        }
        req.send().await.map_err(sdk_error("put_object"))?;

        debug!(driver = %self.driver_id, key, bytes = length, "uploaded object");
        Ok(length)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        // S3 DeleteObject is idempotent; a missing key is not an error.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error("delete_object"))?;
        Ok(())
    }

    async fn aux_keys_present(&self, object: &LogicalObject) -> Result<Vec<String>> {
        let prefix = format!("{}.", object.storage_location);
        let mut tags = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(sdk_error("list_objects_v2"))?;

            for entry in resp.contents() {
                if let Some(tag) = entry.key().and_then(|k| k.strip_prefix(prefix.as_str())) {
                    if !tag.is_empty() {
                        tags.push(tag.to_string());
                    }
                }
            }

            if resp.is_truncated() == Some(true) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        tags.sort();
        Ok(tags)
    }
}

/// Exposes a GetObject body as a streaming reader; the payload is never
/// buffered whole.
fn stream_body(body: ByteStream) -> ObjectReader {
    ObjectReader::new(Box::new(Box::pin(body.into_async_read())))
}

fn service_error(operation: &str, err: impl std::error::Error) -> Error {
    Error::ObjectStore(format!("{operation}: {}", DisplayErrorContext(err)))
}

fn sdk_error<E: std::error::Error + 'static>(operation: &'static str) -> impl FnOnce(E) -> Error {
    move |err| Error::ObjectStore(format!("{operation}: {}", DisplayErrorContext(err)))
}

#[async_trait]
impl StorageDriver for S3Driver {
    fn driver_id(&self) -> &str {
        &self.driver_id
    }

    fn kind(&self) -> StoreKind {
        StoreKind::S3
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn open_read(&self, object: &LogicalObject) -> Result<ObjectReader> {
        self.read(self.key(object)).await
    }

    // open_write stays unsupported: S3 cannot accept a stream of unknown
    // length, and spooling a whole write through a temp file is only done
    // for the explicit save operations below.

    async fn exists(&self, object: &LogicalObject) -> Result<bool> {
        Ok(self.head(self.key(object)).await?.is_some())
    }

    async fn delete(&self, object: &LogicalObject) -> Result<()> {
        self.remove(self.key(object)).await
    }

    async fn size(&self, object: &LogicalObject) -> Result<u64> {
        let key = self.key(object);
        self.head(key)
            .await?
            .ok_or_else(|| Error::DoesNotExist(format!("object '{key}'")))
    }

    async fn save_path(&self, object: &LogicalObject, source: &Path) -> Result<u64> {
        self.put_from_path(self.key(object), source, object.content_type.as_deref())
            .await
    }

    async fn list_aux_objects(&self, object: &LogicalObject) -> Result<Vec<String>> {
        self.aux_keys_present(object).await
    }

    async fn is_aux_cached(&self, object: &LogicalObject, tag: &str) -> Result<bool> {
        Ok(self.head(&self.aux_key(object, tag)?).await?.is_some())
    }

    async fn open_aux_read(&self, object: &LogicalObject, tag: &str) -> Result<ObjectReader> {
        self.read(&self.aux_key(object, tag)?).await
    }

    async fn aux_size(&self, object: &LogicalObject, tag: &str) -> Result<u64> {
        let key = self.aux_key(object, tag)?;
        self.head(&key)
            .await?
            .ok_or_else(|| Error::DoesNotExist(format!("auxiliary object '{tag}'")))
    }

    async fn save_path_as_aux(
        &self,
        object: &LogicalObject,
        source: &Path,
        tag: &str,
    ) -> Result<()> {
        self.put_from_path(&self.aux_key(object, tag)?, source, None)
            .await?;
        Ok(())
    }

    async fn save_stream_as_aux(
        &self,
        object: &LogicalObject,
        mut reader: ObjectReader,
        tag: &str,
        known_length: Option<u64>,
    ) -> Result<u64> {
        // S3 needs the length before the upload starts. A stream of unknown
        // length is spooled to a temp file; a known length still goes through
        // the spool (guaranteed to work at any size) but is checked against
        // what actually arrived.
        let key = self.aux_key(object, tag)?;
        let spool = std::env::temp_dir().join(format!("depot-{}.tmp", Uuid::new_v4()));

        let mut file = tokio::fs::File::create(&spool).await?;
        let result = tokio::io::copy(&mut reader, &mut file).await;
        let outcome = async {
            let copied = result?;
            file.flush().await?;
            drop(file);

            if let Some(expected) = known_length {
                if expected != copied {
                    return Err(Error::ObjectStore(format!(
                        "auxiliary stream for '{tag}' was {copied} bytes, expected {expected}"
                    )));
                }
            }
            self.put_from_path(&key, &spool, None).await
        }
        .await;

        let _ = tokio::fs::remove_file(&spool).await;
        outcome
    }

    async fn delete_aux_object(&self, object: &LogicalObject, tag: &str) -> Result<()> {
        self.remove(&self.aux_key(object, tag)?).await
    }

    async fn delete_all_aux_objects(&self, object: &LogicalObject) -> Result<()> {
        for tag in self.aux_keys_present(object).await? {
            self.remove(&self.aux_key(object, &tag)?).await?;
        }
        Ok(())
    }

    async fn revert_backup_as_aux(&self, object: &LogicalObject, tag: &str) -> Result<()> {
        let aux_key = self.aux_key(object, tag)?;
        if self.head(&aux_key).await?.is_none() {
            return Err(Error::DoesNotExist(format!("auxiliary object '{tag}'")));
        }

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, aux_key))
            .key(self.key(object))
            .send()
            .await
            .map_err(sdk_error("copy_object"))?;
        self.remove(&aux_key).await?;

        debug!(
            driver = %self.driver_id,
            key = self.key(object),
            tag,
            "reverted main content from auxiliary"
        );
        Ok(())
    }

    fn download_redirect_enabled(&self) -> bool {
        self.config.download_redirect
    }

    async fn temporary_download_url(
        &self,
        object: &LogicalObject,
        tag: Option<&str>,
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<String> {
        if !self.config.download_redirect {
            return Err(Error::unsupported(
                "temporary_download_url",
                self.kind().as_str(),
            ));
        }

        let key = match tag {
            Some(tag) => self.aux_key(object, tag)?,
            None => self.key(object).to_string(),
        };

        let mut req = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(content_type) = content_type {
            req = req.response_content_type(content_type);
        }
        if let Some(file_name) = file_name {
            req = req.response_content_disposition(format!("attachment; filename=\"{file_name}\""));
        }

        let presigning = PresigningConfig::expires_in(PRESIGNED_URL_TTL)
            .map_err(|err| Error::ObjectStore(format!("presigning config: {err}")))?;
        let presigned = req
            .presigned(presigning)
            .await
            .map_err(sdk_error("presign get_object"))?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use depot_core::types::ObjectKind;
    use tokio::io::AsyncReadExt;

    use super::*;

    fn s3_config() -> StoreConfig {
        StoreConfig {
            kind: StoreKind::S3,
            bucket: Some("depot-test".to_string()),
            region: Some("us-east-1".to_string()),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            path_style_access: true,
            ..StoreConfig::default()
        }
    }

    #[tokio::test]
    async fn test_new_requires_bucket() {
        let config = StoreConfig {
            bucket: None,
            ..s3_config()
        };
        let err = S3Driver::new("archive", config).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let driver = S3Driver::new("archive", s3_config()).await.unwrap();
        let object = LogicalObject::new(ObjectKind::DataFile, "archive", "f4a1b2");

        assert!(driver.file_system_path(&object).unwrap_err().is_unsupported());
        assert!(driver
            .open_write(&object)
            .await
            .unwrap_err()
            .is_unsupported());
        assert!(driver
            .open_aux_write(&object, "prep")
            .await
            .unwrap_err()
            .is_unsupported());
        assert!(!driver.is_local());
    }

    #[tokio::test]
    async fn test_download_redirect_disabled_by_default() {
        let driver = S3Driver::new("archive", s3_config()).await.unwrap();
        let object = LogicalObject::new(ObjectKind::DataFile, "archive", "f4a1b2");

        assert!(!driver.download_redirect_enabled());
        let err = driver
            .temporary_download_url(&object, None, None, None)
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[tokio::test]
    async fn test_get_object_body_is_exposed_as_a_stream() {
        let body = ByteStream::from_static(b"id\tvalue\n1\t2\n");
        let mut reader = stream_body(body);

        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"id\tvalue\n1\t2\n");
    }

    #[tokio::test]
    async fn test_aux_key_shape() {
        let driver = S3Driver::new("archive", s3_config()).await.unwrap();
        let object = LogicalObject::new(ObjectKind::DataFile, "archive", "10.5072/FK2/f4a1b2");

        assert_eq!(
            driver.aux_key(&object, "preservation").unwrap(),
            "10.5072/FK2/f4a1b2.preservation"
        );
        assert!(driver.aux_key(&object, "").is_err());
        assert!(driver.aux_key(&object, "a/b").is_err());
        assert_eq!(
            driver.storage_location(&object),
            "archive://10.5072/FK2/f4a1b2"
        );
    }
}
