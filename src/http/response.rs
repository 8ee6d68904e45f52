//! The finished response a connection writes back.
//!
//! Handlers never build one directly. A [`ResponseWriter`](super::ResponseWriter)
//! accumulates status, headers and body, and the dispatcher turns the writer
//! into a `Response` once the handler returns. The server also builds a few
//! itself for protocol errors.

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// Status, headers and body of one HTTP/1.1 response.
///
/// # Examples
///
/// ```
/// use pagecache::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::BadRequest)
///     .header("Content-Type", "text/plain")
///     .body("missing query");
///
/// assert_eq!(response.status(), StatusCode::BadRequest);
/// assert_eq!(response.text(), "missing query");
///
/// let wire = response.into_bytes();
/// assert!(wire.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self::from_parts(status, Headers::new(), Vec::new())
    }

    // Writers hand over what they accumulated in one piece.
    pub(crate) fn from_parts(status: StatusCode, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            keep_alive: true,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the `Connection` header written by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Serializes the response for the wire.
    ///
    /// `Content-Length` and `Connection` are always derived here; any values a
    /// handler or a cached record carried for them are dropped. A non-empty
    /// body without a `Content-Type` is sent as `text/plain`.
    pub fn into_bytes(mut self) -> BytesMut {
        self.headers.remove("content-length");
        self.headers.set(
            "Connection",
            if self.keep_alive { "keep-alive" } else { "close" },
        );
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.set("Content-Type", "text/plain; charset=utf-8");
        }

        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 48 + self.body.len());
        buf.put(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        buf.put(self.headers.to_string().as_bytes());
        buf.put(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
        buf.put(self.body.as_slice());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(response: Response) -> String {
        String::from_utf8(response.into_bytes().to_vec()).unwrap()
    }

    #[test]
    fn status_line_length_and_body() {
        let s = wire(Response::new(StatusCode::Ok).body("Hello"));
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn empty_body_gets_no_content_type() {
        let s = wire(Response::new(StatusCode::NoContent));
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn framing_headers_are_recomputed() {
        let mut headers = Headers::new();
        headers.insert("Content-Length", "999");
        headers.insert("Connection", "keep-alive");
        headers.insert("X-Id", "7");
        let response = Response::from_parts(StatusCode::Ok, headers, b"abc".to_vec())
            .keep_alive(false);

        let s = wire(response);
        assert_eq!(s.matches("Content-Length").count(), 1);
        assert!(s.contains("Content-Length: 3\r\n"));
        assert_eq!(s.matches("Connection").count(), 1);
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.contains("X-Id: 7\r\n"));
    }

    #[test]
    fn accessors_expose_parts() {
        let r = Response::new(StatusCode::Created)
            .header("X-Id", "7")
            .body("héllo");
        assert_eq!(r.status(), StatusCode::Created);
        assert_eq!(r.headers().get("x-id"), Some("7"));
        assert_eq!(r.body_ref(), "héllo".as_bytes());
        assert_eq!(r.text(), "héllo");
    }
}
