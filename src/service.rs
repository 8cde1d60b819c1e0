use crate::compact::Compactor;
use crate::future::{FilterFuture, WhitespaceFuture};
use crate::pipeline::{Filters, RequestInfo, ResponseContext};
use http::Request;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

/// A Tower service that compacts whitespace in HTML response bodies.
#[derive(Debug, Clone)]
pub struct WhitespaceService<S> {
    inner: S,
    compactor: Option<Compactor>,
}

impl<S> WhitespaceService<S> {
    /// Creates a new whitespace service wrapping the given inner service.
    ///
    /// With no compactor every body passes through.
    pub fn new(inner: S, compactor: Option<Compactor>) -> Self {
        Self { inner, compactor }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for WhitespaceService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
{
    type Response = http::Response<crate::body::WhitespaceBody<ResBody>>;
    type Error = S::Error;
    type Future = WhitespaceFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        WhitespaceFuture::new(self.inner.call(req), self.compactor)
    }
}

/// A Tower service that runs [`ResponseFilter`](crate::ResponseFilter)
/// hooks around the inner service.
#[derive(Debug, Clone)]
pub struct FilterService<S> {
    inner: S,
    filters: Filters,
}

impl<S> FilterService<S> {
    pub(crate) fn new(inner: S, filters: Filters) -> Self {
        Self { inner, filters }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for FilterService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
{
    type Response = http::Response<crate::pipeline::FilterBody<ResBody>>;
    type Error = S::Error;
    type Future = FilterFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let request = RequestInfo::from_request(&req);

        let mut cx = ResponseContext::before_handler(&request);
        for filter in self.filters.iter() {
            filter.before_handler(&mut cx);
            if cx.is_ended() {
                break;
            }
        }
        let staged = cx.into_outcome();

        if staged.ended {
            debug!(status = %staged.status, "response ended before handler");
            return FilterFuture::ended(staged.status, staged.headers);
        }

        let inner = self.inner.call(req);
        FilterFuture::handler(inner, self.filters.clone(), request, staged.headers)
    }
}
