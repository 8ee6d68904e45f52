//! The writer handlers produce their response through.
//!
//! A handler never returns a [`Response`]; it sets headers, a status and body
//! chunks on the [`ResponseWriter`] held by its
//! [`Context`](crate::context::Context). Keeping the writer behind a trait
//! object lets middleware such as the response cache decorate it for the
//! duration of a handler call and put the original back afterwards.

use std::io;

use bytes::BytesMut;

use super::{Headers, Response, StatusCode};

/// An owned, type-erased [`ResponseWriter`].
pub type BoxedWriter = Box<dyn ResponseWriter>;

/// Sink for one HTTP response.
///
/// Status and headers may be changed at any point before the writer is turned
/// into a [`Response`]; nothing reaches the connection until then. A body
/// write therefore never "locks in" the status, and callers may write the body
/// before the status.
///
/// # Contract
///
/// - [`status`](Self::status) is `200 OK` until a status is written.
/// - [`written`](Self::written) becomes `true` after the first status or body
///   write and never goes back.
/// - Decorators must forward introspection to the writer they wrap so that
///   every layer agrees on what the client will see.
pub trait ResponseWriter: Send {
    /// Returns the headers that will be sent.
    fn headers(&self) -> &Headers;

    /// Returns the headers for modification.
    fn headers_mut(&mut self) -> &mut Headers;

    /// Sets the response status.
    fn write_status(&mut self, status: StatusCode);

    /// Appends `data` to the body, returning the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the underlying connection or buffer refuses
    /// the data.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Appends UTF-8 text to the body.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    fn write_str(&mut self, data: &str) -> io::Result<usize> {
        self.write(data.as_bytes())
    }

    /// Returns the status the client will receive.
    fn status(&self) -> StatusCode;

    /// Returns `true` once a status or any body bytes have been written.
    fn written(&self) -> bool;

    /// Strips one decorator layer. Writers that wrap nothing return themselves.
    fn into_inner(self: Box<Self>) -> BoxedWriter;

    /// Finishes the exchange, yielding the response to transmit.
    fn into_response(self: Box<Self>) -> Response;
}

/// The default [`ResponseWriter`]: buffers the whole response in memory until
/// the dispatcher serializes it.
///
/// # Examples
///
/// ```
/// use pagecache::http::{BufferedWriter, ResponseWriter, StatusCode};
///
/// let mut writer = BufferedWriter::new();
/// writer.headers_mut().insert("Content-Type", "text/plain");
/// writer.write_str("pong").unwrap();
/// writer.write_status(StatusCode::Accepted);
///
/// let response = Box::new(writer).into_response();
/// assert_eq!(response.status(), StatusCode::Accepted);
/// assert_eq!(response.text(), "pong");
/// ```
#[derive(Debug, Default)]
pub struct BufferedWriter {
    status: Option<StatusCode>,
    headers: Headers,
    body: BytesMut,
    body_limit: Option<usize>,
}

impl BufferedWriter {
    /// Creates a writer with no body size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that rejects writes pushing the body past `limit`
    /// bytes. A rejected write leaves the body unchanged.
    pub fn with_body_limit(limit: usize) -> Self {
        Self {
            body_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Returns the body buffered so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl ResponseWriter for BufferedWriter {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.body_limit {
            if self.body.len() + data.len() > limit {
                return Err(io::Error::other(format!(
                    "response body exceeds limit of {limit} bytes"
                )));
            }
        }
        if self.status.is_none() {
            self.status = Some(StatusCode::Ok);
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Ok)
    }

    fn written(&self) -> bool {
        self.status.is_some()
    }

    fn into_inner(self: Box<Self>) -> BoxedWriter {
        self
    }

    fn into_response(self: Box<Self>) -> Response {
        let status = self.status();
        let BufferedWriter { headers, body, .. } = *self;
        Response::from_parts(status, headers, body.to_vec())
    }
}

/// Stand-in left in a context while its real writer is on loan.
#[derive(Debug, Default)]
pub(crate) struct Detached {
    headers: Headers,
}

impl ResponseWriter for Detached {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write_status(&mut self, _status: StatusCode) {}

    fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::NotConnected,
            "response writer is detached",
        ))
    }

    fn status(&self) -> StatusCode {
        StatusCode::InternalServerError
    }

    fn written(&self) -> bool {
        false
    }

    fn into_inner(self: Box<Self>) -> BoxedWriter {
        self
    }

    fn into_response(self: Box<Self>) -> Response {
        Response::new(StatusCode::InternalServerError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ok_and_unwritten() {
        let writer = BufferedWriter::new();
        assert_eq!(writer.status(), StatusCode::Ok);
        assert!(!writer.written());
    }

    #[test]
    fn body_write_marks_written() {
        let mut writer = BufferedWriter::new();
        assert_eq!(writer.write(b"abc").unwrap(), 3);
        assert!(writer.written());
        assert_eq!(writer.status(), StatusCode::Ok);
    }

    #[test]
    fn status_after_body_still_applies() {
        let mut writer = BufferedWriter::new();
        writer.write_str("late").unwrap();
        writer.write_status(StatusCode::NotFound);
        let response = Box::new(writer).into_response();
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.text(), "late");
    }

    #[test]
    fn body_limit_rejects_overflowing_write() {
        let mut writer = BufferedWriter::with_body_limit(4);
        writer.write(b"1234").unwrap();
        let err = writer.write(b"5").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(writer.body(), b"1234");
    }

    #[test]
    fn detached_refuses_writes() {
        let mut writer = Detached::default();
        assert!(writer.write(b"x").is_err());
        assert!(!writer.written());
    }
}
