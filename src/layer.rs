use crate::compact::{Compactor, Newline};
use crate::pipeline::ResponseFilter;
use crate::service::{FilterService, WhitespaceService};
use std::sync::Arc;
use tower::Layer;

/// A Tower layer that compacts whitespace in HTML response bodies.
///
/// Only responses whose `Content-Type` is `text/html` are buffered and
/// compacted; every other body passes through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct WhitespaceLayer {
    compactor: Compactor,
    enabled: bool,
}

impl WhitespaceLayer {
    /// Creates an enabled whitespace layer using the platform line break.
    pub fn new() -> Self {
        Self {
            compactor: Compactor::new(),
            enabled: true,
        }
    }

    /// Turns compaction on or off.
    ///
    /// A disabled layer passes every body through, while keeping the same
    /// service type as an enabled one.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns whether compaction is turned on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the line break written after the doctype and at the end of
    /// each compacted body.
    pub fn newline(mut self, newline: Newline) -> Self {
        self.compactor = self.compactor.newline(newline);
        self
    }
}

impl<S> Layer<S> for WhitespaceLayer {
    type Service = WhitespaceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        WhitespaceService::new(inner, self.enabled.then_some(self.compactor))
    }
}

impl Default for WhitespaceLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// A Tower layer that runs [`ResponseFilter`] hooks around a service.
///
/// Before-handler hooks run in registration order; after-handler hooks run
/// in reverse order.
#[derive(Debug, Clone, Default)]
pub struct FilterLayer {
    filters: Vec<Arc<dyn ResponseFilter>>,
}

impl FilterLayer {
    /// Creates a layer with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter after the ones already registered.
    pub fn filter<F: ResponseFilter>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Returns the number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns whether no filters are registered.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<S> Layer<S> for FilterLayer {
    type Service = FilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FilterService::new(inner, self.filters.clone().into())
    }
}
