// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! Driver registry and public-access policy.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use depot_core::config::{Config, StoreKind};
use depot_core::types::{AccessRequest, LogicalObject};
use depot_core::{Error, Result};
use parking_lot::RwLock;
use tracing::info;

use crate::driver::StorageDriver;
use crate::file::FileSystemDriver;
use crate::handle::StorageHandle;
use crate::remote::RemoteDriver;
use crate::s3::S3Driver;

/// Maps driver identifiers to built backend instances and answers
/// public-access policy questions.
///
/// The registry is the configuration resolver callers pass around instead of
/// consulting global state. Public-access answers are cached per driver
/// identifier on first query and then frozen; a configuration change becomes
/// visible only through the explicit
/// [`invalidate_public_access_cache`](Self::invalidate_public_access_cache)
/// hook.
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn StorageDriver>>,
    config: RwLock<Config>,
    public_access: DashMap<String, bool>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("public_access", &self.public_access)
            .finish_non_exhaustive()
    }
}

impl DriverRegistry {
    /// Builds one driver per configured store.
    ///
    /// # Errors
    ///
    /// Returns an error if any store configuration is incomplete for its
    /// kind.
    pub async fn from_config(config: Config) -> Result<Self> {
        let mut drivers: HashMap<String, Arc<dyn StorageDriver>> = HashMap::new();

        for (driver_id, store) in &config.stores {
            let driver: Arc<dyn StorageDriver> = match store.kind {
                StoreKind::File => {
                    Arc::new(FileSystemDriver::new(driver_id.clone(), store.clone()).await?)
                }
                StoreKind::S3 => Arc::new(S3Driver::new(driver_id.clone(), store.clone()).await?),
                StoreKind::Remote => Arc::new(RemoteDriver::new(driver_id.clone(), store.clone())?),
            };
            info!(driver = %driver_id, kind = %store.kind, "registered storage driver");
            drivers.insert(driver_id.clone(), driver);
        }

        Ok(Self {
            drivers,
            config: RwLock::new(config),
            public_access: DashMap::new(),
        })
    }

    /// The driver registered under an identifier.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnknownDriver`] for an unregistered identifier.
    pub fn driver(&self, driver_id: &str) -> Result<Arc<dyn StorageDriver>> {
        self.drivers
            .get(driver_id)
            .cloned()
            .ok_or_else(|| Error::UnknownDriver(driver_id.to_string()))
    }

    /// Identifiers of all registered drivers.
    #[must_use]
    pub fn driver_ids(&self) -> Vec<String> {
        self.drivers.keys().cloned().collect()
    }

    /// Creates a storage handle for a logical object, selecting the driver
    /// by the object's driver identifier. A missing request defaults to the
    /// empty context.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnknownDriver`] if the object names an
    /// unregistered driver.
    pub fn handle_for(
        &self,
        object: &LogicalObject,
        request: Option<AccessRequest>,
    ) -> Result<StorageHandle> {
        let driver = self.driver(&object.driver_id)?;
        Ok(StorageHandle::new(driver, object.clone(), request))
    }

    /// Whether a store's data is reachable by third parties outside Depot's
    /// own access control.
    ///
    /// Advisory only, never an enforcement point: a higher layer uses it to
    /// warn users before granting restricted access to content on such a
    /// store. The answer is read from configuration once per driver
    /// identifier and cached for the life of this registry; an unknown
    /// identifier answers false.
    #[must_use]
    pub fn is_public_store(&self, driver_id: &str) -> bool {
        *self
            .public_access
            .entry(driver_id.to_string())
            .or_insert_with(|| {
                self.config
                    .read()
                    .store(driver_id)
                    .is_some_and(|store| store.public)
            })
    }

    /// Drops every cached public-access answer, so the next query per driver
    /// re-reads the current configuration. This is the reload hook for
    /// configuration changes.
    pub fn invalidate_public_access_cache(&self) {
        self.public_access.clear();
    }

    /// Replaces the configuration snapshot used for policy lookups.
    ///
    /// Registered drivers are not rebuilt, and already-cached public-access
    /// answers stay frozen until
    /// [`invalidate_public_access_cache`](Self::invalidate_public_access_cache)
    /// is called.
    pub fn update_config(&self, config: Config) {
        *self.config.write() = config;
    }
}
