// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! Storage access layer for Depot.
//!
//! This crate provides:
//! - The storage driver contract every backend implements
//! - Drivers for local filesystem, S3-compatible and remote HTTP stores
//! - The per-object storage handle with stream and metadata accessors
//! - The preservation-version lifecycle for ingested files
//! - The driver registry and public-access policy cache

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod file;
pub mod handle;
pub mod preservation;
pub mod registry;
pub mod remote;
pub mod s3;
pub mod stream;

pub use driver::StorageDriver;
pub use file::FileSystemDriver;
pub use handle::{generate_variable_header, StorageHandle};
pub use registry::DriverRegistry;
pub use remote::RemoteDriver;
pub use s3::S3Driver;
pub use stream::{ObjectReader, ObjectWriter};
