//! Deserializable filter configuration.
//!
//! Lets a host describe its filters in a config file instead of building
//! layers by hand:
//!
//! ```ignore
//! let config: FiltersConfig = serde_json::from_str(r#"{
//!     "no_cache": true,
//!     "hsts": { "max_age_secs": 31536000, "include_subdomains": true },
//!     "compact_html": true
//! }"#)?;
//!
//! let service = ServiceBuilder::new()
//!     .layer(config.filter_layer()?)
//!     .layer(config.whitespace_layer())
//!     .service(my_service);
//! ```

use crate::compact::Newline;
use crate::error::Result;
use crate::filters::{
    CacheControl, DEFAULT_CACHE_DURATION, DEFAULT_HSTS_MAX_AGE, NoCache, StrictTransportSecurity,
    validate_duration,
};
use crate::layer::{FilterLayer, WhitespaceLayer};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Configuration for every filter this crate provides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiltersConfig {
    /// Public caching after the handler. Absent means disabled.
    pub cache: Option<CacheConfig>,
    /// Whether responses are marked as never cacheable.
    pub no_cache: bool,
    /// HTTP Strict Transport Security. Absent means disabled.
    pub hsts: Option<HstsConfig>,
    /// Whether `text/html` bodies are whitespace-compacted.
    pub compact_html: bool,
    /// Line break used by the compactor.
    pub newline: Newline,
}

/// Settings for [`CacheControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache lifetime in seconds. Defaults to 10.
    #[serde(default = "default_cache_secs")]
    pub duration_secs: u64,
}

/// Settings for [`StrictTransportSecurity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HstsConfig {
    /// Policy lifetime in seconds. Defaults to 365 days.
    #[serde(default = "default_hsts_secs")]
    pub max_age_secs: u64,
    /// Whether the policy covers subdomains.
    #[serde(default)]
    pub include_subdomains: bool,
}

fn default_cache_secs() -> u64 {
    DEFAULT_CACHE_DURATION.as_secs()
}

fn default_hsts_secs() -> u64 {
    DEFAULT_HSTS_MAX_AGE.as_secs()
}

impl FiltersConfig {
    /// Builds the header filter layer.
    ///
    /// Filters are registered as no-cache, then HSTS, then cache control.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDuration`](crate::Error::InvalidDuration) when
    /// a configured duration is zero.
    pub fn filter_layer(&self) -> Result<FilterLayer> {
        let mut layer = FilterLayer::new();

        if self.no_cache {
            layer = layer.filter(NoCache);
        }
        if let Some(hsts) = self.hsts {
            let max_age = validate_duration("hsts", Duration::from_secs(hsts.max_age_secs))?;
            layer = layer.filter(
                StrictTransportSecurity::new()
                    .max_age(max_age)
                    .include_subdomains(hsts.include_subdomains),
            );
        }
        if let Some(cache) = self.cache {
            layer = layer.filter(CacheControl::new(Duration::from_secs(cache.duration_secs))?);
        }

        debug!(filters = layer.len(), "built response filter layer");
        Ok(layer)
    }

    /// Builds the whitespace layer, disabled unless `compact_html` is set.
    pub fn whitespace_layer(&self) -> WhitespaceLayer {
        WhitespaceLayer::new()
            .newline(self.newline)
            .enabled(self.compact_html)
    }
}
