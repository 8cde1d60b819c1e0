//! Header filters for caching and transport security policies.

use crate::error::{Error, Result};
use crate::pipeline::{ResponseContext, ResponseFilter};
use chrono::{DateTime, TimeDelta, Utc};
use http::header::{self, HeaderValue};
use std::time::Duration;

/// Default cache lifetime of [`CacheControl`].
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10);

/// Default `max-age` of [`StrictTransportSecurity`] (365 days).
pub const DEFAULT_HSTS_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Marks responses as publicly cacheable for a fixed duration.
///
/// Runs after the handler and sets:
/// - `Cache-Control: public, max-age=<N>, must-revalidate, proxy-revalidate`
/// - `Expires` to now plus the duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl {
    duration: Duration,
}

impl CacheControl {
    /// Creates the filter.
    ///
    /// Fails when `duration` is shorter than one second.
    pub fn new(duration: Duration) -> Result<Self> {
        Ok(Self {
            duration: validate_duration("cache", duration)?,
        })
    }

    /// Returns the cache lifetime.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Changes the cache lifetime, keeping the old one on error.
    pub fn set_duration(&mut self, duration: Duration) -> Result<()> {
        self.duration = validate_duration("cache", duration)?;
        Ok(())
    }
}

impl Default for CacheControl {
    fn default() -> Self {
        Self {
            duration: DEFAULT_CACHE_DURATION,
        }
    }
}

impl ResponseFilter for CacheControl {
    fn after_handler(&self, cx: &mut ResponseContext<'_>) {
        let seconds = self.duration.as_secs();
        if seconds == 0 {
            return;
        }

        let headers = cx.headers_mut();
        let cache_control = format!("public, max-age={seconds}, must-revalidate, proxy-revalidate");
        if let Ok(value) = HeaderValue::try_from(cache_control) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if let Some(expires) = http_date_from_now(i64::try_from(seconds).unwrap_or(i64::MAX)) {
            headers.insert(header::EXPIRES, expires);
        }
    }
}

/// Marks responses as never cacheable.
///
/// Runs before the handler, discards any body produced so far, and sets
/// `Expires` in the past, `Cache-Control: no-cache, no-store, max-age=0,
/// must-revalidate` and `Pragma: no-cache`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoCache;

impl ResponseFilter for NoCache {
    fn before_handler(&self, cx: &mut ResponseContext<'_>) {
        cx.clear();

        let headers = cx.headers_mut();
        if let Some(expires) = http_date_from_now(-60) {
            headers.insert(header::EXPIRES, expires);
        }
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, max-age=0, must-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    }
}

/// Sets `Strict-Transport-Security` on responses to secure requests.
///
/// A request counts as secure when the host inserted a
/// [`SecureTransport`](crate::SecureTransport) marker or its URI scheme is
/// `https`. Plain requests are left alone, as is any request when the
/// max-age is shorter than one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrictTransportSecurity {
    max_age: Duration,
    include_subdomains: bool,
}

impl StrictTransportSecurity {
    /// Creates the filter with a max-age of 365 days, excluding subdomains.
    pub fn new() -> Self {
        Self {
            max_age: DEFAULT_HSTS_MAX_AGE,
            include_subdomains: false,
        }
    }

    /// Sets how long browsers should remember to use HTTPS only.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Sets whether the policy also covers subdomains.
    pub fn include_subdomains(mut self, include: bool) -> Self {
        self.include_subdomains = include;
        self
    }

    /// Returns the header value, or `None` when max-age is under a second.
    pub fn header_value(&self) -> Option<HeaderValue> {
        let seconds = self.max_age.as_secs();
        if seconds == 0 {
            return None;
        }

        let mut value = format!("max-age={seconds}");
        if self.include_subdomains {
            value.push_str("; includeSubDomains");
        }
        HeaderValue::try_from(value).ok()
    }
}

impl Default for StrictTransportSecurity {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseFilter for StrictTransportSecurity {
    fn before_handler(&self, cx: &mut ResponseContext<'_>) {
        let request = cx.request();
        let secure = request.is_secure_connection()
            || request
                .scheme()
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https"));
        if !secure {
            return;
        }

        if let Some(value) = self.header_value() {
            cx.headers_mut()
                .insert(header::STRICT_TRANSPORT_SECURITY, value);
        }
    }
}

/// Rejects durations shorter than one whole second.
pub(crate) fn validate_duration(filter: &'static str, duration: Duration) -> Result<Duration> {
    if duration.as_secs() == 0 {
        return Err(Error::InvalidDuration { filter, duration });
    }
    Ok(duration)
}

/// Formats the current time shifted by `offset_secs` as an HTTP-date.
fn http_date_from_now(offset_secs: i64) -> Option<HeaderValue> {
    let now = Utc::now();
    let when = TimeDelta::try_seconds(offset_secs)
        .and_then(|offset| now.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    HeaderValue::try_from(when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()).ok()
}
