//! Settings for [`Cache::new`](super::Cache::new).

use std::time::Duration;

use serde::{Deserialize, Deserializer, de::Error as _};

use super::CacheError;

/// Configuration of the default in-memory cache.
///
/// Deserializable from JSON; missing fields take their defaults and `ttl` is
/// given in (possibly fractional) seconds:
///
/// ```
/// use std::time::Duration;
/// use pagecache::cache::CacheConfig;
///
/// let config = CacheConfig::from_json(r#"{ "ttl": 1.5, "single_flight": true }"#).unwrap();
/// assert_eq!(config.ttl, Duration::from_millis(1500));
/// assert_eq!(config.max_capacity, 10_000);
/// assert!(config.single_flight);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a cached response lives after its last write.
    #[serde(deserialize_with = "seconds")]
    pub ttl: Duration,

    /// Maximum number of cached responses.
    pub max_capacity: u64,

    /// Serialize cache-miss executions per key. Off by default; see
    /// [`Cache::single_flight`](super::Cache::single_flight).
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 10_000,
            single_flight: false,
        }
    }
}

impl CacheConfig {
    /// Default settings with the given time-to-live.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    #[must_use]
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the store can be built from these settings.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.ttl.is_zero() {
            return Err(CacheError::Config("ttl must be greater than zero".into()));
        }
        if self.max_capacity == 0 {
            return Err(CacheError::Config(
                "max_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(CacheConfig::from_json("{}").unwrap(), CacheConfig::default());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = CacheConfig::from_json(r#"{ "ttl": 0 }"#).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn negative_ttl_is_a_parse_error() {
        let err = CacheConfig::from_json(r#"{ "ttl": -1 }"#).unwrap_err();
        assert!(matches!(err, CacheError::ConfigParse(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(CacheConfig::from_json(r#"{ "tll": 5 }"#).is_err());
    }

    #[test]
    fn builder_methods() {
        let config = CacheConfig::with_ttl(Duration::from_secs(5))
            .max_capacity(10)
            .single_flight(true);
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.max_capacity, 10);
        assert!(config.single_flight);
        assert!(config.validate().is_ok());
        assert!(config.max_capacity(0).validate().is_err());
    }
}
