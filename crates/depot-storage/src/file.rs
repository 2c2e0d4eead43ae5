// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! Local filesystem storage driver.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use depot_core::config::{StoreConfig, StoreKind};
use depot_core::types::LogicalObject;
use depot_core::{Error, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::driver::StorageDriver;
use crate::stream::{ObjectReader, ObjectWriter};

/// Stores objects as plain files under a configured root directory.
///
/// An object's main content lives at `<root>/<storage_location>`; the
/// auxiliary object under `tag` lives beside it at
/// `<root>/<storage_location>.<tag>`. Writes of whole payloads go through a
/// temp file and a same-filesystem rename.
pub struct FileSystemDriver {
    driver_id: String,
    root: PathBuf,
    temp_dir: PathBuf,
    config: StoreConfig,
}

impl FileSystemDriver {
    /// Creates a driver rooted at the configured directory, creating it if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is configured or it cannot be
    /// created.
    pub async fn new(driver_id: impl Into<String>, config: StoreConfig) -> Result<Self> {
        let driver_id = driver_id.into();
        let root = config.directory.clone().ok_or_else(|| {
            Error::Config(format!("store '{driver_id}' has no directory configured"))
        })?;
        let temp_dir = root.join(".tmp");
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(&temp_dir).await?;

        Ok(Self {
            driver_id,
            root,
            temp_dir,
            config,
        })
    }

    fn object_path(&self, object: &LogicalObject) -> Result<PathBuf> {
        let relative = Path::new(&object.storage_location);
        let traversal = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if object.storage_location.is_empty() || relative.is_absolute() || traversal {
            return Err(Error::InvalidLocation(object.storage_location.clone()));
        }
        Ok(self.root.join(relative))
    }

    fn aux_path(&self, object: &LogicalObject, tag: &str) -> Result<PathBuf> {
        if tag.is_empty() || tag.contains(['/', '\\']) {
            return Err(Error::InvalidLocation(format!("auxiliary tag '{tag}'")));
        }
        let mut path = self.object_path(object)?.into_os_string();
        path.push(".");
        path.push(tag);
        Ok(PathBuf::from(path))
    }

    fn temp_path(&self) -> PathBuf {
        self.temp_dir.join(format!("{}.tmp", Uuid::new_v4()))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Copies `source` to `target` through a temp file and rename. The rename
    /// is atomic on one filesystem, so readers never observe a partial copy.
    async fn copy_into_place(&self, source: &Path, target: &Path) -> Result<u64> {
        self.ensure_parent_dir(target).await?;
        let temp = self.temp_path();
        let copied = fs::copy(source, &temp).await?;
        if let Err(err) = fs::rename(&temp, target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(Error::Io(err));
        }
        Ok(copied)
    }

    async fn remove_if_present(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    async fn aux_tags_present(&self, object: &LogicalObject) -> Result<Vec<String>> {
        let main_path = self.object_path(object)?;
        let Some(parent) = main_path.parent() else {
            return Ok(Vec::new());
        };
        let Some(file_name) = main_path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{file_name}.");

        let mut tags = Vec::new();
        let mut entries = match fs::read_dir(parent).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(tag) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) {
                if !tag.is_empty() {
                    tags.push(tag.to_string());
                }
            }
        }
        tags.sort();
        Ok(tags)
    }
}

#[async_trait]
impl StorageDriver for FileSystemDriver {
    fn driver_id(&self) -> &str {
        &self.driver_id
    }

    fn kind(&self) -> StoreKind {
        StoreKind::File
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn is_local(&self) -> bool {
        true
    }

    fn file_system_path(&self, object: &LogicalObject) -> Result<PathBuf> {
        self.object_path(object)
    }

    async fn open_read(&self, object: &LogicalObject) -> Result<ObjectReader> {
        let file = fs::File::open(self.object_path(object)?).await?;
        Ok(ObjectReader::new(Box::new(file)))
    }

    async fn open_write(&self, object: &LogicalObject) -> Result<ObjectWriter> {
        let path = self.object_path(object)?;
        self.ensure_parent_dir(&path).await?;
        let file = fs::File::create(&path).await?;
        Ok(ObjectWriter::new(Box::new(file)))
    }

    async fn exists(&self, object: &LogicalObject) -> Result<bool> {
        match fs::metadata(self.object_path(object)?).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::Io(err)),
        }
    }

    async fn delete(&self, object: &LogicalObject) -> Result<()> {
        Self::remove_if_present(&self.object_path(object)?).await
    }

    async fn size(&self, object: &LogicalObject) -> Result<u64> {
        Ok(fs::metadata(self.object_path(object)?).await?.len())
    }

    async fn save_path(&self, object: &LogicalObject, source: &Path) -> Result<u64> {
        let target = self.object_path(object)?;
        let stored = self.copy_into_place(source, &target).await?;
        debug!(
            driver = %self.driver_id,
            location = %object.storage_location,
            bytes = stored,
            "saved main content"
        );
        Ok(stored)
    }

    async fn list_aux_objects(&self, object: &LogicalObject) -> Result<Vec<String>> {
        self.aux_tags_present(object).await
    }

    async fn is_aux_cached(&self, object: &LogicalObject, tag: &str) -> Result<bool> {
        match fs::metadata(self.aux_path(object, tag)?).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::Io(err)),
        }
    }

    async fn open_aux_read(&self, object: &LogicalObject, tag: &str) -> Result<ObjectReader> {
        let file = fs::File::open(self.aux_path(object, tag)?).await?;
        Ok(ObjectReader::new(Box::new(file)))
    }

    async fn open_aux_write(&self, object: &LogicalObject, tag: &str) -> Result<ObjectWriter> {
        let path = self.aux_path(object, tag)?;
        self.ensure_parent_dir(&path).await?;
        let file = fs::File::create(&path).await?;
        Ok(ObjectWriter::new(Box::new(file)))
    }

    async fn aux_size(&self, object: &LogicalObject, tag: &str) -> Result<u64> {
        Ok(fs::metadata(self.aux_path(object, tag)?).await?.len())
    }

    fn aux_file_system_path(&self, object: &LogicalObject, tag: &str) -> Result<PathBuf> {
        self.aux_path(object, tag)
    }

    async fn save_path_as_aux(
        &self,
        object: &LogicalObject,
        source: &Path,
        tag: &str,
    ) -> Result<()> {
        let target = self.aux_path(object, tag)?;
        self.copy_into_place(source, &target).await?;
        Ok(())
    }

    async fn save_stream_as_aux(
        &self,
        object: &LogicalObject,
        mut reader: ObjectReader,
        tag: &str,
        _known_length: Option<u64>,
    ) -> Result<u64> {
        // True streaming; the length hint is unnecessary here.
        let target = self.aux_path(object, tag)?;
        self.ensure_parent_dir(&target).await?;
        let temp = self.temp_path();

        let mut file = fs::File::create(&temp).await?;
        let result = tokio::io::copy(&mut reader, &mut file).await;
        let copied = match result {
            Ok(copied) => copied,
            Err(err) => {
                let _ = fs::remove_file(&temp).await;
                return Err(Error::Io(err));
            }
        };
        file.flush().await?;
        drop(file);

        if let Err(err) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(Error::Io(err));
        }
        Ok(copied)
    }

    async fn delete_aux_object(&self, object: &LogicalObject, tag: &str) -> Result<()> {
        Self::remove_if_present(&self.aux_path(object, tag)?).await
    }

    async fn delete_all_aux_objects(&self, object: &LogicalObject) -> Result<()> {
        for tag in self.aux_tags_present(object).await? {
            Self::remove_if_present(&self.aux_path(object, &tag)?).await?;
        }
        Ok(())
    }

    async fn revert_backup_as_aux(&self, object: &LogicalObject, tag: &str) -> Result<()> {
        let aux = self.aux_path(object, tag)?;
        if !self.is_aux_cached(object, tag).await? {
            return Err(Error::DoesNotExist(format!("auxiliary object '{tag}'")));
        }
        let main = self.object_path(object)?;
        fs::rename(&aux, &main).await?;
        debug!(
            driver = %self.driver_id,
            location = %object.storage_location,
            tag,
            "reverted main content from auxiliary"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use depot_core::types::ObjectKind;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    async fn create_test_driver() -> (FileSystemDriver, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig {
            directory: Some(temp.path().join("store")),
            ..StoreConfig::default()
        };
        let driver = FileSystemDriver::new("local", config).await.unwrap();
        (driver, temp)
    }

    fn test_object(location: &str) -> LogicalObject {
        LogicalObject::new(ObjectKind::DataFile, "local", location)
    }

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        content
    }

    #[tokio::test]
    async fn test_save_and_read_main_content() {
        let (driver, temp) = create_test_driver().await;
        let object = test_object("2026/08/f4a1b2");

        let source = temp.path().join("incoming.dat");
        tokio::fs::write(&source, b"Hello, World!").await.unwrap();

        assert!(!driver.exists(&object).await.unwrap());
        let stored = driver.save_path(&object, &source).await.unwrap();
        assert_eq!(stored, 13);
        assert!(driver.exists(&object).await.unwrap());
        assert_eq!(driver.size(&object).await.unwrap(), 13);

        // Copy semantics: the source is still there.
        assert!(source.exists());

        let reader = driver.open_read(&object).await.unwrap();
        assert_eq!(read_all(reader).await, b"Hello, World!");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (driver, temp) = create_test_driver().await;
        let object = test_object("victim.dat");

        // Deleting a non-existent object must not fail.
        driver.delete(&object).await.unwrap();

        let source = temp.path().join("incoming.dat");
        tokio::fs::write(&source, b"bytes").await.unwrap();
        driver.save_path(&object, &source).await.unwrap();

        driver.delete(&object).await.unwrap();
        assert!(!driver.exists(&object).await.unwrap());
        driver.delete(&object).await.unwrap();
    }

    #[tokio::test]
    async fn test_streamed_write() {
        let (driver, _temp) = create_test_driver().await;
        let object = test_object("streamed.dat");

        let mut writer = driver.open_write(&object).await.unwrap();
        writer.write_all(b"streamed bytes").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(driver.size(&object).await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_aux_lifecycle() {
        let (driver, temp) = create_test_driver().await;
        let object = test_object("sample.tab");

        assert!(driver.list_aux_objects(&object).await.unwrap().is_empty());
        assert!(!driver.is_aux_cached(&object, "prep").await.unwrap());

        let prep = temp.path().join("prep.xml");
        tokio::fs::write(&prep, b"<prep/>").await.unwrap();
        driver.save_path_as_aux(&object, &prep, "prep").await.unwrap();

        let stream = ObjectReader::from_bytes(bytes::Bytes::from_static(b"thumbnail bytes"));
        let stored = driver
            .save_stream_as_aux(&object, stream, "thumb64", None)
            .await
            .unwrap();
        assert_eq!(stored, 15);

        assert!(driver.is_aux_cached(&object, "prep").await.unwrap());
        assert_eq!(driver.aux_size(&object, "thumb64").await.unwrap(), 15);
        assert_eq!(
            driver.list_aux_objects(&object).await.unwrap(),
            vec!["prep".to_string(), "thumb64".to_string()]
        );

        let reader = driver.open_aux_read(&object, "prep").await.unwrap();
        assert_eq!(read_all(reader).await, b"<prep/>");

        driver.delete_aux_object(&object, "prep").await.unwrap();
        assert!(!driver.is_aux_cached(&object, "prep").await.unwrap());
        // Idempotent.
        driver.delete_aux_object(&object, "prep").await.unwrap();

        driver.delete_all_aux_objects(&object).await.unwrap();
        assert!(driver.list_aux_objects(&object).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revert_backup_as_aux() {
        let (driver, temp) = create_test_driver().await;
        let object = test_object("sample.tab");

        let main = temp.path().join("main.tab");
        tokio::fs::write(&main, b"transformed").await.unwrap();
        driver.save_path(&object, &main).await.unwrap();

        let backup = temp.path().join("backup.tab");
        tokio::fs::write(&backup, b"original").await.unwrap();
        driver.save_path_as_aux(&object, &backup, "orig").await.unwrap();

        driver.revert_backup_as_aux(&object, "orig").await.unwrap();

        let reader = driver.open_read(&object).await.unwrap();
        assert_eq!(read_all(reader).await, b"original");
        assert!(!driver.is_aux_cached(&object, "orig").await.unwrap());
    }

    #[tokio::test]
    async fn test_revert_missing_backup_fails() {
        let (driver, _temp) = create_test_driver().await;
        let object = test_object("sample.tab");

        let err = driver.revert_backup_as_aux(&object, "orig").await.unwrap_err();
        assert!(matches!(err, Error::DoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_nested_locations() {
        let (driver, temp) = create_test_driver().await;
        let object = test_object("10.5072/FK2/ABCDEF/f4a1b2");

        let source = temp.path().join("incoming.dat");
        tokio::fs::write(&source, b"nested").await.unwrap();
        driver.save_path(&object, &source).await.unwrap();

        let path = driver.file_system_path(&object).unwrap();
        assert!(path.ends_with("10.5072/FK2/ABCDEF/f4a1b2"));
        assert!(driver.exists(&object).await.unwrap());
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (driver, _temp) = create_test_driver().await;

        for location in ["../escape", "/etc/passwd", ""] {
            let object = test_object(location);
            let err = driver.file_system_path(&object).unwrap_err();
            assert!(matches!(err, Error::InvalidLocation(_)), "{location}");
        }

        let object = test_object("fine.dat");
        assert!(driver.aux_file_system_path(&object, "a/b").is_err());
        assert!(driver.aux_file_system_path(&object, "").is_err());
    }

    #[tokio::test]
    async fn test_storage_location_prefix() {
        let (driver, _temp) = create_test_driver().await;
        let object = test_object("sample.tab");
        assert_eq!(driver.storage_location(&object), "local://sample.tab");
    }
}
