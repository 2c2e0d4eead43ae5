// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! Typed stream handles for object content.
//!
//! A reader is explicitly either present or absent on a handle; callers deal
//! with `Option<ObjectReader>` instead of possibly-null getters.

use std::io::Cursor;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

type CloseFn = Box<dyn FnOnce() -> std::io::Result<()> + Send>;

/// Readable handle over an object's bytes.
///
/// Wraps whatever source the driver produced (a file, an HTTP body, an object
/// store response) behind one `AsyncRead` type. Drivers whose sources need an
/// explicit teardown attach a close hook; for everything else dropping the
/// reader releases the resource.
pub struct ObjectReader {
    inner: Box<dyn AsyncRead + Send + Unpin>,
    close: Option<CloseFn>,
}

impl ObjectReader {
    /// Wraps a raw source.
    #[must_use]
    pub fn new(inner: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self { inner, close: None }
    }

    /// Wraps a raw source with an explicit close hook.
    ///
    /// The hook runs exactly once, when [`close`](Self::close) is called.
    #[must_use]
    pub fn with_close(
        inner: Box<dyn AsyncRead + Send + Unpin>,
        close: impl FnOnce() -> std::io::Result<()> + Send + 'static,
    ) -> Self {
        Self {
            inner,
            close: Some(Box::new(close)),
        }
    }

    /// A reader over an in-memory payload.
    #[must_use]
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::new(Box::new(Cursor::new(bytes)))
    }

    /// Releases the underlying source.
    ///
    /// # Errors
    ///
    /// Returns the close hook's error, if the source has one and it fails.
    pub fn close(mut self) -> std::io::Result<()> {
        match self.close.take() {
            Some(close) => close(),
            None => Ok(()),
        }
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("has_close_hook", &self.close.is_some())
            .finish()
    }
}

/// Writable handle over an object's bytes.
///
/// Callers finish a write with `AsyncWriteExt::shutdown`, which flushes the
/// sink; write and shutdown failures propagate.
pub struct ObjectWriter {
    inner: Box<dyn AsyncWrite + Send + Unpin>,
}

impl ObjectWriter {
    /// Wraps a raw sink.
    #[must_use]
    pub fn new(inner: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self { inner }
    }
}

impl AsyncWrite for ObjectWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl std::fmt::Debug for ObjectWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriter").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_reader_from_bytes() {
        let mut reader = ObjectReader::from_bytes(Bytes::from_static(b"Hello, World!"));
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "Hello, World!");
        reader.close().unwrap();
    }

    #[tokio::test]
    async fn test_close_hook_runs_once() {
        let reader = ObjectReader::with_close(Box::new(Cursor::new(Vec::new())), || {
            Err(std::io::Error::other("backend hung up"))
        });
        let err = reader.close().unwrap_err();
        assert_eq!(err.to_string(), "backend hung up");
    }

    #[tokio::test]
    async fn test_close_without_hook_is_ok() {
        let reader = ObjectReader::from_bytes(Bytes::new());
        assert!(reader.close().is_ok());
    }
}
