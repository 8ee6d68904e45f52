//! Response caching: wrap a handler so its output is recorded on the first
//! request and replayed on later ones.
//!
//! ## How it works
//!
//! For every request the wrapped handler receives, [`Cache`] derives a key
//! from the URL and looks it up in its [`EntryStore`]:
//!
//! - **Hit**: the stored body, status and (unless the variant omits them)
//!   headers are written to the client. The handler does not run.
//! - **Miss**: the context's writer is swapped for a [`CaptureWriter`] and the
//!   handler runs. Each body chunk goes to the client first and is then
//!   appended to the stored record, as long as the status is below 300. If the
//!   handler aborts the request, the record is deleted afterwards.
//! - **Anything else** (store failure, undecodable entry, failed replay): the
//!   handler runs uncached. Caching problems are logged and never fail a
//!   request.
//!
//! ## Variants
//!
//! | Method                                     | Key            | Headers replayed |
//! |--------------------------------------------|----------------|------------------|
//! | [`Cache::cache_page`]                      | path + query   | yes              |
//! | [`Cache::cache_page_without_query`]        | path           | yes              |
//! | [`Cache::cache_page_without_header`]       | path + query   | no               |
//!
//! ## Concurrency
//!
//! Two concurrent misses for the same key both run the handler and both
//! append to the same record; the stored body can end up mixed or truncated.
//! Enable [`Cache::single_flight`] to run misses for one key one at a time.

use std::fmt::Display;
use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::http::ResponseWriter;
use crate::router::Handler;
use crate::store::{EntryStore, MemoryStore};
use crate::Request;

pub mod config;
mod flight;
pub mod key;
pub mod record;
pub mod storage;
pub mod writer;

pub use config::CacheConfig;
pub use record::{RecordError, ResponseRecord};
pub use storage::{RecordStore, StorageError};
pub use writer::CaptureWriter;

use flight::KeyLocks;

/// Errors from building a [`Cache`] or replaying a cached response.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache configuration: {0}")]
    Config(String),

    #[error("failed to parse cache configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("failed to write cached response: {0}")]
    Replay(#[from] io::Error),
}

/// What a wrapped handler's key covers and what a hit replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Include the query string in the key.
    pub include_query: bool,
    /// Restore the stored headers on a hit.
    pub replay_headers: bool,
}

impl CachePolicy {
    /// Key on path + query, replay headers.
    pub const FULL: Self = Self {
        include_query: true,
        replay_headers: true,
    };

    /// Key on the path only, replay headers.
    pub const WITHOUT_QUERY: Self = Self {
        include_query: false,
        replay_headers: true,
    };

    /// Key on path + query, replay body and status only.
    pub const WITHOUT_HEADER: Self = Self {
        include_query: true,
        replay_headers: false,
    };

    /// Derives the cache key for `request` under this policy.
    pub fn key_for(&self, request: &Request) -> String {
        if self.include_query {
            key::request_uri_key(request)
        } else {
            key::path_key(request)
        }
    }
}

/// Wraps handlers with response caching.
///
/// Cloning is cheap; clones share the same store.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pagecache::{Cache, CacheConfig, Method, Request, Router, StatusCode};
///
/// let cache = Cache::new(CacheConfig::with_ttl(Duration::from_secs(30))).unwrap();
///
/// let mut router = Router::new();
/// router.get("/time", cache.cache_page(|ctx| {
///     let _ = ctx.string(StatusCode::Ok, &format!("{:?}", std::time::Instant::now()));
/// }));
///
/// let first = router.call(Request::new(Method::Get, "/time"));
/// let second = router.call(Request::new(Method::Get, "/time"));
/// assert_eq!(first.text(), second.text());
/// ```
#[derive(Clone)]
pub struct Cache {
    storage: RecordStore,
    locks: Option<Arc<KeyLocks>>,
}

impl Cache {
    /// Builds a cache on a fresh [`MemoryStore`].
    ///
    /// # Errors
    ///
    /// [`CacheError::Config`] when the settings are unusable.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        if let Err(err) = config.validate() {
            error!(error = %err, "can't create cache storage");
            return Err(err);
        }
        let store = MemoryStore::new(config.ttl, config.max_capacity);
        Ok(Self::with_store(Arc::new(store)).single_flight(config.single_flight))
    }

    /// Builds a cache on any [`EntryStore`].
    pub fn with_store(store: Arc<dyn EntryStore>) -> Self {
        Self {
            storage: RecordStore::new(store),
            locks: None,
        }
    }

    /// Runs cache misses for the same key one at a time.
    ///
    /// A request that waited for the lock looks the key up again and is
    /// normally served from the record the previous holder produced. Misses
    /// for different keys are unaffected.
    #[must_use]
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(|| Arc::new(KeyLocks::new()));
        self
    }

    /// Returns the record store the cache reads and writes.
    pub fn storage(&self) -> &RecordStore {
        &self.storage
    }

    /// Caches by full request URI and replays headers on a hit.
    pub fn cache_page<H>(&self, handler: H) -> impl Fn(&mut Context) + Send + Sync + 'static
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.wrap(CachePolicy::FULL, handler)
    }

    /// Caches by path only, so every query string shares one entry.
    pub fn cache_page_without_query<H>(
        &self,
        handler: H,
    ) -> impl Fn(&mut Context) + Send + Sync + 'static
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.wrap(CachePolicy::WITHOUT_QUERY, handler)
    }

    /// Caches by full request URI but replays only body and status.
    pub fn cache_page_without_header<H>(
        &self,
        handler: H,
    ) -> impl Fn(&mut Context) + Send + Sync + 'static
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.wrap(CachePolicy::WITHOUT_HEADER, handler)
    }

    /// Wraps `handler` under an arbitrary [`CachePolicy`].
    pub fn wrap<H>(
        &self,
        policy: CachePolicy,
        handler: H,
    ) -> impl Fn(&mut Context) + Send + Sync + 'static
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        let cache = self.clone();
        let handler: Handler = Arc::new(handler);
        move |ctx: &mut Context| cache.serve(policy, &handler, ctx)
    }

    fn serve(&self, policy: CachePolicy, handler: &Handler, ctx: &mut Context) {
        let key = policy.key_for(ctx.request());

        // Hits never wait on the per-key lock; only a miss takes it and then
        // looks the key up again.
        let lookup = match &self.locks {
            Some(locks) => match self.storage.get(&key) {
                Ok(record) => {
                    debug!(key, "cache hit");
                    Ok(Some(record))
                }
                Err(StorageError::NotFound) => {
                    locks.run(&key, || self.lookup_or_execute(&key, handler, ctx))
                }
                Err(err) => Err(err),
            },
            None => self.lookup_or_execute(&key, handler, ctx),
        };

        let record = match lookup {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(err) => return self.fallback(handler, ctx, &key, "can't get entry from cache", err),
        };

        if let Err(err) = replay(&record, policy.replay_headers, ctx.writer_mut()) {
            self.fallback(handler, ctx, &key, "can't replay cached response", err);
        }
    }

    // Returns the stored record on a hit. On a miss the handler runs behind a
    // capture proxy and there is nothing left to replay.
    fn lookup_or_execute(
        &self,
        key: &str,
        handler: &Handler,
        ctx: &mut Context,
    ) -> Result<Option<ResponseRecord>, StorageError> {
        match self.storage.get(key) {
            Ok(record) => {
                debug!(key, "cache hit");
                return Ok(Some(record));
            }
            Err(StorageError::NotFound) => debug!(key, "cache miss"),
            Err(err) => return Err(err),
        }

        let storage = self.storage.clone();
        ctx.map_writer(|real| Box::new(CaptureWriter::new(real, storage, key)));
        handler(ctx);
        ctx.map_writer(|proxy| proxy.into_inner());

        if ctx.is_aborted() {
            match self.storage.delete(key) {
                Ok(()) => debug!(key, "dropped cache entry of aborted request"),
                Err(StorageError::NotFound) => {}
                Err(err) => warn!(key, error = %err, "can't delete key from storage"),
            }
        }
        Ok(None)
    }

    fn fallback(
        &self,
        handler: &Handler,
        ctx: &mut Context,
        key: &str,
        reason: &str,
        err: impl Display,
    ) {
        warn!(key, error = %err, "{reason}; serving uncached");
        handler(ctx);
    }
}

// Body first, then status, then headers.
fn replay(
    record: &ResponseRecord,
    with_headers: bool,
    writer: &mut dyn ResponseWriter,
) -> Result<(), CacheError> {
    let status = record.status_code()?;
    writer.write(&record.data)?;
    writer.write_status(status);
    if with_headers {
        writer.headers_mut().apply_multimap(&record.header);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::http::BufferedWriter;
    use crate::http::headers::HeaderMultimap;
    use crate::{Method, StatusCode};

    fn cache() -> Cache {
        Cache::new(CacheConfig::with_ttl(Duration::from_secs(60))).unwrap()
    }

    #[test]
    fn policies_pick_the_right_key() {
        let request = Request::new(Method::Get, "/p?x=1");
        assert_eq!(CachePolicy::FULL.key_for(&request), "%2Fp%3Fx%3D1");
        assert_eq!(CachePolicy::WITHOUT_HEADER.key_for(&request), "%2Fp%3Fx%3D1");
        assert_eq!(CachePolicy::WITHOUT_QUERY.key_for(&request), "%2Fp");
    }

    #[test]
    fn replay_writes_body_status_and_headers() {
        let mut header = HeaderMultimap::new();
        header.insert("X-A".to_owned(), vec!["1".to_owned(), "2".to_owned()]);
        let record = ResponseRecord::new(StatusCode::Created, header, b"body".to_vec());

        let mut writer = BufferedWriter::new();
        replay(&record, true, &mut writer).unwrap();
        assert_eq!(writer.status(), StatusCode::Created);
        assert_eq!(writer.headers().get_all("x-a").collect::<Vec<_>>(), vec!["1", "2"]);

        let mut bare = BufferedWriter::new();
        replay(&record, false, &mut bare).unwrap();
        assert!(bare.headers().is_empty());
        assert_eq!(bare.body(), b"body");
    }

    #[test]
    fn replay_rejects_unknown_status_before_writing() {
        let record = ResponseRecord {
            status: 299,
            ..ResponseRecord::default()
        };
        let mut writer = BufferedWriter::new();
        assert!(matches!(
            replay(&record, true, &mut writer),
            Err(CacheError::Record(RecordError::UnknownStatus(299)))
        ));
        assert!(!writer.written());
    }

    #[test]
    fn writer_is_restored_after_miss() {
        let cache = cache();
        let wrapped = cache.cache_page(|ctx| {
            let _ = ctx.string(StatusCode::Ok, "fresh");
        });

        let mut ctx = Context::new(Request::new(Method::Get, "/restore"));
        wrapped(&mut ctx);

        // A capture proxy left in place would record this write too.
        ctx.writer_mut().write(b" extra").unwrap();
        assert_eq!(cache.storage().get("%2Frestore").unwrap().data, b"fresh");
        assert_eq!(ctx.into_response().text(), "fresh extra");
    }

    #[test]
    fn single_flight_hits_skip_the_key_lock() {
        let cache = cache().single_flight(true);
        let wrapped = cache.cache_page(|ctx| {
            let _ = ctx.string(StatusCode::Ok, "warm");
        });
        wrapped(&mut Context::new(Request::new(Method::Get, "/hot")));

        let locks = Arc::clone(cache.locks.as_ref().unwrap());
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = thread::spawn(move || {
            locks.run("%2Fhot", || {
                held_tx.send(()).unwrap();
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            });
        });
        held_rx.recv().unwrap();

        let started = Instant::now();
        let mut ctx = Context::new(Request::new(Method::Get, "/hot"));
        wrapped(&mut ctx);
        let elapsed = started.elapsed();

        release_tx.send(()).unwrap();
        holder.join().unwrap();

        assert!(elapsed < Duration::from_secs(1), "hit waited {elapsed:?}");
        assert_eq!(ctx.into_response().text(), "warm");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = CacheConfig::default().max_capacity(0);
        assert!(matches!(Cache::new(config), Err(CacheError::Config(_))));
    }
}
