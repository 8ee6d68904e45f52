//! Tokio front end that feeds HTTP/1.1 connections into a [`Router`].
//!
//! Each connection gets its own task and serves requests one after another
//! until the client closes it or asks for `Connection: close`. Handlers and
//! cache stores are synchronous, so routing happens on Tokio's blocking pool
//! and never stalls the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::request::RequestError;
use crate::http::{Request, Response, StatusCode};
use crate::router::Router;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request (head plus body) buffered per connection: 8 MiB.
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// A bound listener waiting for a [`Router`] to serve.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use pagecache::{Cache, CacheConfig, Router, Server, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = Cache::new(CacheConfig::with_ttl(Duration::from_secs(10)))?;
///     let mut router = Router::new();
///     router.get("/hello", cache.cache_page(|ctx| {
///         let _ = ctx.string(StatusCode::Ok, "Hello!");
///     }));
///
///     Server::bind("127.0.0.1:8080").await?.run(router).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds a listener. Pass port `0` to let the OS pick one and read it back
    /// with [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address can't be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves `router` until the task is dropped. Failed accepts are logged
    /// and skipped, so this only returns through cancellation.
    pub async fn run(self, router: Router) -> Result<(), ServerError> {
        let router = Arc::new(router);
        info!(address = %self.local_addr, "pagecache listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };
            debug!(%peer, "connection accepted");

            let router = Arc::clone(&router);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, peer, router).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

// Outcome of trying to cut one request off the front of the read buffer.
enum Framed {
    Request { request: Request, len: usize },
    NeedMore,
    Reject(Response),
}

fn frame(buf: &[u8]) -> Framed {
    if buf.len() > MAX_REQUEST_SIZE {
        return Framed::Reject(
            Response::new(StatusCode::PayloadTooLarge).body("Request entity too large"),
        );
    }
    match Request::parse(buf) {
        Ok((request, body_offset)) => {
            let len = body_offset + request.content_length().unwrap_or(0);
            if buf.len() < len {
                Framed::NeedMore
            } else {
                Framed::Request { request, len }
            }
        }
        Err(RequestError::Incomplete) => Framed::NeedMore,
        Err(e) => Framed::Reject(
            Response::new(StatusCode::BadRequest).body(format!("Bad Request: {e}")),
        ),
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        if stream.read_buf(&mut buf).await? == 0 {
            debug!(%peer, "connection closed by peer");
            return Ok(());
        }

        let (request, len) = match frame(&buf) {
            Framed::Request { request, len } => (request, len),
            Framed::NeedMore => continue,
            Framed::Reject(response) => {
                warn!(%peer, status = %response.status(), "rejecting request");
                stream
                    .write_all(&response.keep_alive(false).into_bytes())
                    .await?;
                return Ok(());
            }
        };

        let keep_alive = request.is_keep_alive();
        debug!(%peer, method = %request.method(), path = %request.path(), "dispatching request");

        let response = dispatch(Arc::clone(&router), request).await;
        stream
            .write_all(&response.keep_alive(keep_alive).into_bytes())
            .await?;
        stream.flush().await?;
        let _ = buf.split_to(len);

        if !keep_alive {
            debug!(%peer, "closing connection on request");
            return Ok(());
        }
    }
}

/// Routes one request on the blocking pool. A panicking handler becomes a
/// `500` for that request only.
async fn dispatch(router: Arc<Router>, request: Request) -> Response {
    match tokio::task::spawn_blocking(move || router.call(request)).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "handler failed");
            Response::new(StatusCode::InternalServerError).body("Internal Server Error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_complete_request_with_body() {
        let raw = b"POST /p HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET";
        match frame(raw) {
            Framed::Request { request, len } => {
                assert_eq!(request.path(), "/p");
                assert_eq!(len, raw.len() - 3);
            }
            _ => panic!("expected a framed request"),
        }
    }

    #[test]
    fn waits_for_head_and_body() {
        assert!(matches!(frame(b"GET / HTTP/1.1\r\nHost: x"), Framed::NeedMore));
        assert!(matches!(
            frame(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc"),
            Framed::NeedMore
        ));
    }

    #[test]
    fn rejects_malformed_request() {
        match frame(b"\x00\x01 nonsense\r\n\r\n") {
            Framed::Reject(response) => assert_eq!(response.status(), StatusCode::BadRequest),
            _ => panic!("expected a rejection"),
        }
    }
}
