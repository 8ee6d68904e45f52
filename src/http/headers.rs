//! HTTP header map with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per [RFC 9110 §5].

use std::collections::BTreeMap;
use std::fmt;

/// Header names mapped to their values, in the order the values were added.
///
/// This is the shape headers take when they leave the live writer, e.g. inside
/// a stored response record.
pub type HeaderMultimap = BTreeMap<String, Vec<String>>;

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name,
/// matching the semantics of HTTP/1.1 header fields (RFC 9110 §5.3).
///
/// # Examples
///
/// ```
/// use pagecache::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html; charset=utf-8");
/// headers.insert("X-Custom", "first");
/// headers.insert("X-Custom", "second");
///
/// assert_eq!(headers.get("content-type"), Some("text/html; charset=utf-8"));
/// let all: Vec<_> = headers.get_all("x-custom").collect();
/// assert_eq!(all, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Replaces every existing value of `name` with a single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.inner.push((name, value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes all entries with the given header name (case-insensitive).
    ///
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Groups the entries by name.
    ///
    /// Names that differ only in case fold into the spelling seen first; the
    /// values of each name keep their insertion order.
    ///
    /// ```
    /// use pagecache::http::Headers;
    ///
    /// let mut headers = Headers::new();
    /// headers.insert("Set-Cookie", "a=1");
    /// headers.insert("set-cookie", "b=2");
    ///
    /// let map = headers.to_multimap();
    /// assert_eq!(map["Set-Cookie"], vec!["a=1", "b=2"]);
    /// ```
    pub fn to_multimap(&self) -> HeaderMultimap {
        let mut map = HeaderMultimap::new();
        for (name, value) in &self.inner {
            let existing = map
                .keys()
                .find(|k| k.eq_ignore_ascii_case(name))
                .cloned();
            map.entry(existing.unwrap_or_else(|| name.clone()))
                .or_default()
                .push(value.clone());
        }
        map
    }

    /// Replaces the values of every name present in `map` with the values
    /// stored there, leaving other names untouched.
    pub fn apply_multimap(&mut self, map: &HeaderMultimap) {
        for (name, values) in map {
            self.remove(name);
            for value in values {
                self.insert(name.clone(), value.clone());
            }
        }
    }
}

impl From<&HeaderMultimap> for Headers {
    fn from(map: &HeaderMultimap) -> Self {
        let mut headers = Headers::with_capacity(map.values().map(Vec::len).sum());
        headers.apply_multimap(map);
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
