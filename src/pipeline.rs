use http::header::{self, HeaderMap, HeaderValue};
use http::{Request, StatusCode};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Filters registered on a [`FilterLayer`](crate::FilterLayer), in registration order.
pub(crate) type Filters = Arc<[Arc<dyn ResponseFilter>]>;

/// A filter invoked around the request handler.
///
/// Both hooks default to doing nothing, so a filter only implements the
/// hooks it needs. Filters are shared between concurrent requests and must
/// not keep per-request state.
pub trait ResponseFilter: fmt::Debug + Send + Sync + 'static {
    /// Runs before the handler. Headers set here are applied to the
    /// handler's response, replacing values the handler set under the
    /// same name.
    fn before_handler(&self, _cx: &mut ResponseContext<'_>) {}

    /// Runs after the handler produced its response, before the response
    /// is handed back to the host.
    fn after_handler(&self, _cx: &mut ResponseContext<'_>) {}
}

/// Marker a host inserts into request extensions for requests that arrived
/// over a secure channel, such as a TLS-terminated connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecureTransport;

/// What the filters may know about the request being answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    scheme: Option<String>,
    host: Option<String>,
    secure: bool,
}

impl RequestInfo {
    /// Captures scheme, host and transport security from `req`.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let host = req.uri().host().map(str::to_owned).or_else(|| {
            req.headers()
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        });

        Self {
            scheme: req.uri().scheme_str().map(str::to_owned),
            host,
            secure: req.extensions().get::<SecureTransport>().is_some(),
        }
    }

    /// Returns the URI scheme, if the request target carried one.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Returns the host from the request target or the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns whether the host marked the connection as secure.
    pub fn is_secure_connection(&self) -> bool {
        self.secure
    }
}

/// The hook a [`ResponseContext`] was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Before the handler runs.
    BeforeHandler,
    /// After the handler produced a response.
    AfterHandler,
}

/// Per-request view of the response handed to each filter hook.
#[derive(Debug)]
pub struct ResponseContext<'a> {
    request: &'a RequestInfo,
    hook: Hook,
    status: StatusCode,
    headers: HeaderMap,
    discard_body: bool,
    ended: bool,
}

/// What is left of a context once its hooks have run.
pub(crate) struct Outcome {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) discard_body: bool,
    pub(crate) ended: bool,
}

impl<'a> ResponseContext<'a> {
    pub(crate) fn before_handler(request: &'a RequestInfo) -> Self {
        Self {
            request,
            hook: Hook::BeforeHandler,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            discard_body: false,
            ended: false,
        }
    }

    pub(crate) fn after_handler(
        request: &'a RequestInfo,
        status: StatusCode,
        headers: HeaderMap,
    ) -> Self {
        Self {
            request,
            hook: Hook::AfterHandler,
            status,
            headers,
            discard_body: false,
            ended: false,
        }
    }

    /// Returns the request being answered.
    pub fn request(&self) -> &'a RequestInfo {
        self.request
    }

    /// Returns the hook currently running.
    pub fn hook(&self) -> Hook {
        self.hook
    }

    /// Returns the response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the response status.
    ///
    /// Before the handler runs this only matters if the response is ended.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Discards the body content produced so far.
    ///
    /// After the handler this replaces its body with an empty one. Before
    /// the handler nothing has been produced yet.
    pub fn clear(&mut self) {
        if self.hook == Hook::AfterHandler {
            self.discard_body = true;
        }
    }

    /// Returns whether the body will be discarded.
    pub fn is_body_discarded(&self) -> bool {
        self.discard_body
    }

    /// Ends the response.
    ///
    /// Before the handler, the handler is skipped and the response is built
    /// from this context with an empty body. After the handler, the
    /// remaining after-handler hooks are skipped.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Returns whether [`end`](Self::end) was called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Answers with `301 Moved Permanently` to `location` and ends the response.
    pub fn redirect_permanent(&mut self, location: HeaderValue) {
        self.status = StatusCode::MOVED_PERMANENTLY;
        self.headers.insert(header::LOCATION, location);
        self.clear();
        self.end();
    }

    pub(crate) fn into_outcome(self) -> Outcome {
        Outcome {
            status: self.status,
            headers: self.headers,
            discard_body: self.discard_body,
            ended: self.ended,
        }
    }
}

pin_project! {
    /// Response body of a [`FilterService`](crate::FilterService).
    ///
    /// Either the handler's body, or empty when a filter ended the response
    /// early or discarded the body.
    pub struct FilterBody<B> {
        #[pin]
        inner: Option<B>,
    }
}

impl<B> FilterBody<B> {
    /// Wraps the handler's body.
    pub fn handler(inner: B) -> Self {
        Self { inner: Some(inner) }
    }

    /// Creates an empty body.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Returns whether this body was discarded or never produced.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }
}

impl<B: Body> Body for FilterBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project().inner.as_pin_mut() {
            Some(inner) => inner.poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Some(inner) => inner.is_end_stream(),
            None => true,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Some(inner) => inner.size_hint(),
            None => SizeHint::with_exact(0),
        }
    }
}
