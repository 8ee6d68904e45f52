//! The capture proxy installed in front of the real writer on a cache miss.

use std::io;

use tracing::warn;

use super::record::ResponseRecord;
use super::storage::{RecordStore, StorageError};
use crate::Response;
use crate::http::{BoxedWriter, Headers, ResponseWriter, StatusCode};

/// Passes every write through to the real writer and mirrors successful body
/// writes into the cache under one key.
///
/// The client always gets the data first. A chunk is captured only if the
/// real writer accepted it and the response status is below 300; capture
/// failures are logged and never reach the handler.
///
/// A status of 300 or above set after some body was captured discards the
/// stored record, and nothing more is captured for the rest of the response.
pub struct CaptureWriter {
    inner: BoxedWriter,
    storage: RecordStore,
    key: String,
    captured: bool,
    discarded: bool,
}

impl CaptureWriter {
    pub fn new(inner: BoxedWriter, storage: RecordStore, key: impl Into<String>) -> Self {
        Self {
            inner,
            storage,
            key: key.into(),
            captured: false,
            discarded: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn capture(&mut self, chunk: &[u8]) {
        let status = self.inner.status();
        if self.discarded || status.as_u16() >= 300 {
            return;
        }
        let record = ResponseRecord::new(status, self.inner.headers().to_multimap(), chunk);
        match self.storage.append(&self.key, record) {
            Ok(()) => self.captured = true,
            Err(err) => warn!(key = %self.key, error = %err, "can't append response to cache"),
        }
    }

    fn discard(&mut self) {
        self.discarded = true;
        if !self.captured {
            return;
        }
        match self.storage.delete(&self.key) {
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(err) => warn!(key = %self.key, error = %err, "can't discard cached response"),
        }
    }
}

impl ResponseWriter for CaptureWriter {
    fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut Headers {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        self.inner.write_status(status);
        if status.as_u16() >= 300 && !self.discarded {
            self.discard();
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(data)?;
        self.capture(&data[..written]);
        Ok(written)
    }

    fn write_str(&mut self, data: &str) -> io::Result<usize> {
        let written = self.inner.write_str(data)?;
        self.capture(&data.as_bytes()[..written]);
        Ok(written)
    }

    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn written(&self) -> bool {
        self.inner.written()
    }

    fn into_inner(self: Box<Self>) -> BoxedWriter {
        self.inner
    }

    fn into_response(self: Box<Self>) -> Response {
        self.inner.into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::http::BufferedWriter;
    use crate::store::MemoryStore;

    fn proxy(inner: BufferedWriter) -> (CaptureWriter, RecordStore) {
        let storage = RecordStore::new(Arc::new(MemoryStore::new(Duration::from_secs(60), 100)));
        (
            CaptureWriter::new(Box::new(inner), storage.clone(), "/page"),
            storage,
        )
    }

    #[test]
    fn chunks_accumulate_in_one_record() {
        let (mut writer, storage) = proxy(BufferedWriter::new());
        writer.headers_mut().insert("Content-Type", "text/plain");
        writer.write(b"one ").unwrap();
        writer.write_str("two").unwrap();

        let record = storage.get("/page").unwrap();
        assert_eq!(record.data, b"one two");
        assert_eq!(record.status, 200);
        assert_eq!(record.header["Content-Type"], vec!["text/plain"]);

        let response = Box::new(writer).into_response();
        assert_eq!(response.text(), "one two");
    }

    #[test]
    fn redirects_and_errors_pass_through_uncaptured() {
        let (mut writer, storage) = proxy(BufferedWriter::new());
        writer.write_status(StatusCode::BadRequest);
        writer.write(b"nope").unwrap();

        assert!(matches!(storage.get("/page"), Err(StorageError::NotFound)));
        assert_eq!(writer.status(), StatusCode::BadRequest);
    }

    #[test]
    fn late_error_status_discards_captured_body() {
        let (mut writer, storage) = proxy(BufferedWriter::new());
        writer.write(b"oops").unwrap();
        assert_eq!(storage.get("/page").unwrap().status, 200);

        writer.write_status(StatusCode::InternalServerError);
        assert!(matches!(storage.get("/page"), Err(StorageError::NotFound)));

        // Switching back to a success status does not resume capturing.
        writer.write_status(StatusCode::Ok);
        writer.write(b" more").unwrap();
        assert!(matches!(storage.get("/page"), Err(StorageError::NotFound)));
        assert_eq!(Box::new(writer).into_response().text(), "oops more");
    }

    #[test]
    fn refused_write_is_not_captured_and_error_surfaces() {
        let (mut writer, storage) = proxy(BufferedWriter::with_body_limit(3));
        writer.write(b"abc").unwrap();
        assert!(writer.write(b"d").is_err());

        assert_eq!(storage.get("/page").unwrap().data, b"abc");
    }

    #[test]
    fn introspection_follows_real_writer() {
        let (mut writer, _storage) = proxy(BufferedWriter::new());
        assert!(!writer.written());
        writer.write_status(StatusCode::NoContent);
        assert!(writer.written());
        assert_eq!(writer.status(), StatusCode::NoContent);
        assert_eq!(writer.key(), "/page");
    }

    #[test]
    fn into_inner_yields_the_real_writer() {
        let (mut writer, _storage) = proxy(BufferedWriter::new());
        writer.write(b"x").unwrap();
        let inner = Box::new(writer).into_inner();
        assert_eq!(inner.into_response().text(), "x");
    }
}
