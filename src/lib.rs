//! # pagecache
//!
//! Response caching for a small HTTP/1.1 server: wrap a handler and its first
//! successful response is recorded, then replayed for later requests to the
//! same URL until the entry expires.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use pagecache::{Cache, CacheConfig, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Cache::new(CacheConfig::with_ttl(Duration::from_secs(60)))?;
//!
//!     let mut router = Router::new();
//!     router.get("/report", cache.cache_page(|ctx| {
//!         let _ = ctx.string(StatusCode::Ok, "expensive report");
//!     }));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://127.0.0.1:8080");
//!     server.run(router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod router;
pub mod server;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{Cache, CacheConfig, CacheError, CachePolicy};
pub use context::Context;
pub use http::{BufferedWriter, Headers, Method, Request, Response, ResponseWriter, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
pub use store::{EntryStore, MemoryStore, StoreError};
