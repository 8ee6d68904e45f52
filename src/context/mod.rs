//! Per-request context: the request, the writer its response goes to, and
//! the abort flag.
//!
//! Handlers receive `&mut Context` and produce their output through
//! [`Context::writer_mut`] or the convenience helpers ([`Context::string`],
//! [`Context::json`]). Middleware may swap the writer for a decorator with
//! [`Context::replace_writer`] and restore it afterwards.

use std::io;
use std::mem;

use serde::Serialize;

use crate::Request;
use crate::http::writer::Detached;
use crate::http::{BoxedWriter, BufferedWriter, Response, ResponseWriter, StatusCode};

/// Per-request state handed to every handler.
pub struct Context {
    request: Request,
    writer: BoxedWriter,
    aborted: bool,
}

impl Context {
    /// Creates a context that buffers its response in a [`BufferedWriter`].
    pub fn new(request: Request) -> Self {
        Self::with_writer(request, Box::new(BufferedWriter::new()))
    }

    /// Creates a context that writes its response to `writer`.
    pub fn with_writer(request: Request, writer: BoxedWriter) -> Self {
        Self {
            request,
            writer,
            aborted: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn writer(&self) -> &dyn ResponseWriter {
        self.writer.as_ref()
    }

    pub fn writer_mut(&mut self) -> &mut dyn ResponseWriter {
        self.writer.as_mut()
    }

    /// Installs `writer` as the active writer and returns the previous one.
    pub fn replace_writer(&mut self, writer: BoxedWriter) -> BoxedWriter {
        mem::replace(&mut self.writer, writer)
    }

    /// Replaces the active writer with whatever `wrap` builds from it.
    ///
    /// While `wrap` runs the context holds a detached writer that rejects
    /// body writes.
    pub fn map_writer(&mut self, wrap: impl FnOnce(BoxedWriter) -> BoxedWriter) {
        let current = self.replace_writer(Box::new(Detached::default()));
        self.writer = wrap(current);
    }

    /// Writes `text` as a `text/plain` body with the given status.
    ///
    /// # Errors
    ///
    /// Propagates the writer's error if the body is refused.
    pub fn string(&mut self, status: StatusCode, text: &str) -> io::Result<usize> {
        self.writer
            .headers_mut()
            .set("Content-Type", "text/plain; charset=utf-8");
        self.writer.write_status(status);
        self.writer.write_str(text)
    }

    /// Serializes `value` as a JSON body with the given status.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be serialized or the writer refuses the body.
    pub fn json<T>(&mut self, status: StatusCode, value: &T) -> io::Result<usize>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value)?;
        self.writer
            .headers_mut()
            .set("Content-Type", "application/json; charset=utf-8");
        self.writer.write_status(status);
        self.writer.write(&body)
    }

    /// Marks the request as aborted. Output already written stays written.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Writes `status` and aborts.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.writer.write_status(status);
        self.abort();
    }

    /// Writes `value` as JSON with `status` and aborts.
    ///
    /// # Errors
    ///
    /// Same as [`json`](Self::json); the request is aborted either way.
    pub fn abort_with_status_json<T>(&mut self, status: StatusCode, value: &T) -> io::Result<usize>
    where
        T: Serialize + ?Sized,
    {
        self.abort();
        self.json(status, value)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Consumes the context, yielding the response its writer accumulated.
    pub fn into_response(self) -> Response {
        self.writer.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;
    use crate::http::Headers;

    fn ctx() -> Context {
        Context::new(Request::new(Method::Get, "/ping"))
    }

    struct Layer {
        inner: BoxedWriter,
    }

    impl ResponseWriter for Layer {
        fn headers(&self) -> &Headers {
            self.inner.headers()
        }
        fn headers_mut(&mut self) -> &mut Headers {
            self.inner.headers_mut()
        }
        fn write_status(&mut self, status: StatusCode) {
            self.inner.write_status(status);
        }
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.inner.write(data)
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

    #[test]
    fn string_sets_content_type_and_status() {
        let mut ctx = ctx();
        ctx.string(StatusCode::Created, "made").unwrap();
        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::Created);
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(response.text(), "made");
    }

    #[test]
    fn abort_with_json_writes_and_flags() {
        let mut ctx = ctx();
        ctx.abort_with_status_json(StatusCode::Ok, &serde_json::json!({"time": 1}))
            .unwrap();
        assert!(ctx.is_aborted());
        assert_eq!(ctx.into_response().text(), r#"{"time":1}"#);
    }

    #[test]
    fn map_writer_decorates_and_into_inner_restores() {
        let mut ctx = ctx();
        ctx.map_writer(|inner| Box::new(Layer { inner }));
        ctx.string(StatusCode::Ok, "a").unwrap();

        let decorated = ctx.replace_writer(Box::new(BufferedWriter::new()));
        let original = decorated.into_inner();
        ctx.replace_writer(original);

        ctx.writer_mut().write(b"b").unwrap();
        assert_eq!(ctx.into_response().text(), "ab");
    }
}
