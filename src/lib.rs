//! Response filters for Tower: header policies and HTML whitespace compaction.
//!
//! This crate provides two Tower layers:
//!
//! - [`FilterLayer`] runs [`ResponseFilter`] hooks before and after the
//!   inner service. The bundled filters set caching and transport security
//!   headers.
//! - [`WhitespaceLayer`] buffers `text/html` response bodies and emits them
//!   with incidental whitespace removed.
//!
//! # Example
//!
//! ```ignore
//! use http_response_filters::{
//!     CacheControl, FilterLayer, StrictTransportSecurity, WhitespaceLayer,
//! };
//! use std::time::Duration;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(
//!         FilterLayer::new()
//!             .filter(StrictTransportSecurity::new().include_subdomains(true))
//!             .filter(CacheControl::new(Duration::from_secs(60))?),
//!     )
//!     .layer(WhitespaceLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Hooks
//!
//! - Before-handler hooks run in registration order. A hook may end the
//!   response, in which case the inner service is never called.
//! - Headers set before the handler replace the handler's headers of the
//!   same name.
//! - After-handler hooks run in reverse registration order, before the
//!   response is returned and so before any of its body is sent.
//!
//! # Compaction Rules
//!
//! Only responses whose `Content-Type` media type is `text/html` are
//! compacted. The whole body is buffered and, once it ends:
//! - whitespace runs between `>` and `<` are removed
//! - runs of two or more tabs are removed
//! - runs of two or more whitespace characters ending in a newline are
//!   removed, newline included
//! - `<pre>` and `<textarea>` contents are left untouched
//! - the result is trimmed, `<!DOCTYPE html>` is followed by exactly one
//!   configured line break, and one trailing line break is added
//!
//! # Response Modifications
//!
//! When compaction is applied:
//! - `Content-Length` header is removed (compacted size is unknown)
//! - a [`Compacted`] extension is added so outer layers do not compact again

#![deny(missing_docs)]

mod body;
mod compact;
mod config;
mod error;
mod filters;
mod future;
mod layer;
mod pipeline;
mod redirect;
mod service;
mod sink;

pub use body::WhitespaceBody;
pub use compact::{Compactor, Newline};
pub use config::{CacheConfig, FiltersConfig, HstsConfig};
pub use error::{Error, Result};
pub use filters::{
    CacheControl, DEFAULT_CACHE_DURATION, DEFAULT_HSTS_MAX_AGE, NoCache, StrictTransportSecurity,
};
pub use future::{Compacted, FilterFuture, WhitespaceFuture};
pub use layer::{FilterLayer, WhitespaceLayer};
pub use pipeline::{
    FilterBody, Hook, RequestInfo, ResponseContext, ResponseFilter, SecureTransport,
};
pub use redirect::{location_value, permanent_redirect};
pub use service::{FilterService, WhitespaceService};
pub use sink::WhitespaceSink;
