//! Request routing: map URL paths and HTTP methods to handler functions.
//!
//! This module provides [`Router`], which dispatches incoming HTTP requests to
//! handler functions based on the request method and URL path. Paths match
//! exactly; trailing slashes are normalized on both patterns and incoming
//! paths, so `/users/` and `/users` are treated as equivalent. The query string
//! never takes part in matching.
//!
//! Handlers are synchronous: they run on a blocking thread supplied by the
//! [`Server`](crate::Server) and write their output through the
//! [`Context`]'s writer.

use std::sync::Arc;

use crate::context::Context;
use crate::{Method, Request, Response, StatusCode};

/// Type-erased handler that writes the response for a [`Context`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared
/// across threads without copying the underlying closure. In practice you never
/// construct this type directly; use [`Router::get`], [`Router::post`], and the
/// other method-specific helpers instead.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync + 'static>;

// Strips a trailing slash from everything but the root path.
fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// HTTP request router that dispatches requests to registered handler functions.
///
/// Routes are evaluated in registration order; the first route whose HTTP
/// method and path both match the incoming request is used. When the path is
/// known but no route accepts the method, `405 Method Not Allowed` is written
/// with an `Allow` header; otherwise `404 Not Found`.
///
/// # Examples
///
/// ```rust
/// use pagecache::{Method, Request, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/ping", |ctx| {
///     let _ = ctx.string(StatusCode::Ok, "pong");
/// });
///
/// let response = router.call(Request::new(Method::Get, "/ping"));
/// assert_eq!(response.text(), "pong");
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pagecache::Router;
    ///
    /// let router = Router::new();
    /// assert!(router.is_empty());
    /// ```
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests matching `path`.
    ///
    /// # Arguments
    ///
    /// - `path`: exact URL path (e.g. `"/users"`).
    /// - `handler`: function that writes the response through the [`Context`].
    pub fn get<H>(&mut self, path: &str, handler: H)
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::Get, path, handler);
    }

    /// Register a handler for `HEAD` requests matching `path`.
    pub fn head<H>(&mut self, path: &str, handler: H)
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::Head, path, handler);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post<H>(&mut self, path: &str, handler: H)
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::Post, path, handler);
    }

    /// Register a handler for `PUT` requests matching `path`.
    pub fn put<H>(&mut self, path: &str, handler: H)
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::Put, path, handler);
    }

    /// Register a handler for `DELETE` requests matching `path`.
    pub fn delete<H>(&mut self, path: &str, handler: H)
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::Delete, path, handler);
    }

    /// Register a handler for `method` requests matching `path`.
    ///
    /// The method-specific helpers all funnel into this one.
    pub fn route<H>(&mut self, method: Method, path: &str, handler: H)
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler: Arc::new(handler),
        });
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Run the handler matching `ctx`'s request, or write the `404`/`405`
    /// fallback response.
    pub fn handle(&self, ctx: &mut Context) {
        let path = normalize(ctx.request().path()).to_owned();
        let method = ctx.request().method().clone();

        let mut allowed: Vec<&str> = Vec::new();
        for route in self.routes.iter().filter(|r| r.path == path) {
            if route.method == method {
                (route.handler)(ctx);
                return;
            }
            allowed.push(route.method.as_str());
        }

        if allowed.is_empty() {
            let _ = ctx.string(StatusCode::NotFound, "Not Found");
        } else {
            ctx.writer_mut().headers_mut().set("Allow", allowed.join(", "));
            let _ = ctx.string(StatusCode::MethodNotAllowed, "Method Not Allowed");
        }
    }

    /// Dispatch `request` and return the buffered response.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pagecache::{Method, Request, Router, StatusCode};
    ///
    /// let router = Router::new();
    /// let response = router.call(Request::new(Method::Get, "/missing"));
    /// assert_eq!(response.status(), StatusCode::NotFound);
    /// ```
    pub fn call(&self, request: Request) -> Response {
        let mut ctx = Context::new(request);
        self.handle(&mut ctx);
        ctx.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, target: &str) -> Request {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn ok_router() -> Router {
        let mut router = Router::new();
        router.get("/users", |ctx| {
            let _ = ctx.string(StatusCode::Ok, "list");
        });
        router.post("/users", |ctx| {
            let _ = ctx.string(StatusCode::Created, "made");
        });
        router
    }

    #[test]
    fn dispatches_by_method() {
        let router = ok_router();
        assert_eq!(router.call(request("GET", "/users")).text(), "list");
        assert_eq!(
            router.call(request("POST", "/users")).status(),
            StatusCode::Created
        );
    }

    #[test]
    fn query_string_is_ignored_for_matching() {
        let router = ok_router();
        assert_eq!(router.call(request("GET", "/users?page=2")).text(), "list");
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let mut router = Router::new();
        router.get("/docs/", |ctx| {
            let _ = ctx.string(StatusCode::Ok, "docs");
        });
        assert_eq!(router.call(request("GET", "/docs")).text(), "docs");
        assert_eq!(router.call(request("GET", "/docs/")).text(), "docs");
    }

    #[test]
    fn unknown_path_is_404() {
        let router = ok_router();
        let response = router.call(request("GET", "/nope"));
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[test]
    fn wrong_method_is_405_with_allow() {
        let router = ok_router();
        let response = router.call(request("DELETE", "/users"));
        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(response.headers().get("allow"), Some("GET, POST"));
    }

    #[test]
    fn len_counts_routes() {
        let router = ok_router();
        assert_eq!(router.len(), 2);
        assert!(!router.is_empty());
    }
}
