//! Core types and utilities for Depot, a data-repository storage layer.
//!
//! This crate provides the fundamental building blocks used across all Depot
//! components:
//! - Configuration management for named stores
//! - Error types covering the storage failure taxonomy
//! - Common data types (logical objects, access requests, auxiliary tags)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, LoggingConfig, StoreConfig, StoreKind};
pub use error::{Error, Result};
pub use types::{
    driver_prefix, write_access_requested, AccessOption, AccessRequest, FileCopy, LogicalObject,
    ObjectKind, DRIVER_SEPARATOR, INGEST_AUX_TAGS,
};
