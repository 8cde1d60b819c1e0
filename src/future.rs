use crate::body::WhitespaceBody;
use crate::compact::Compactor;
use crate::pipeline::{FilterBody, Filters, RequestInfo, ResponseContext};
use http::{HeaderMap, Response, StatusCode, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Response extension marking a body that a [`WhitespaceLayer`](crate::WhitespaceLayer)
/// already compacts. Outer whitespace layers pass such responses through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compacted;

pin_project! {
    /// Future for whitespace service responses.
    pub struct WhitespaceFuture<F> {
        #[pin]
        inner: F,
        compactor: Option<Compactor>,
    }
}

impl<F> WhitespaceFuture<F> {
    pub(crate) fn new(inner: F, compactor: Option<Compactor>) -> Self {
        Self { inner, compactor }
    }
}

impl<F, B, E> Future for WhitespaceFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<WhitespaceBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(response)) => Poll::Ready(Ok(wrap_response(response, *this.compactor))),
        }
    }
}

/// Wraps the response body for compaction if it is HTML.
fn wrap_response<B>(
    response: Response<B>,
    compactor: Option<Compactor>,
) -> Response<WhitespaceBody<B>> {
    let (mut parts, body) = response.into_parts();

    let Some(compactor) = compactor else {
        return Response::from_parts(parts, WhitespaceBody::passthrough(body));
    };

    let body = if parts.extensions.get::<Compacted>().is_some() {
        debug!("response body already compacted");
        WhitespaceBody::passthrough(body)
    } else if is_html(&parts.headers) {
        // Compacted size is unknown until the body ends
        parts.headers.remove(header::CONTENT_LENGTH);
        parts.extensions.insert(Compacted);
        debug!("compacting html response body");
        WhitespaceBody::compacted(body, compactor)
    } else {
        WhitespaceBody::passthrough(body)
    };

    Response::from_parts(parts, body)
}

/// Checks whether the media type of Content-Type is `text/html`.
fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case("text/html")
        })
}

pin_project! {
    /// Future for filter service responses.
    ///
    /// # Panics
    ///
    /// A response ended before the handler is handed out on the first poll.
    /// Polling the future again after that panics.
    pub struct FilterFuture<F> {
        #[pin]
        kind: Kind<F>,
    }
}

pin_project! {
    #[project = KindProj]
    enum Kind<F> {
        Handler {
            #[pin]
            inner: F,
            filters: Filters,
            request: RequestInfo,
            staged: HeaderMap,
        },
        Ended {
            parts: Option<http::response::Parts>,
        },
    }
}

impl<F> FilterFuture<F> {
    pub(crate) fn handler(
        inner: F,
        filters: Filters,
        request: RequestInfo,
        staged: HeaderMap,
    ) -> Self {
        Self {
            kind: Kind::Handler {
                inner,
                filters,
                request,
                staged,
            },
        }
    }

    pub(crate) fn ended(status: StatusCode, headers: HeaderMap) -> Self {
        let (mut parts, ()) = Response::new(()).into_parts();
        parts.status = status;
        parts.headers = headers;
        Self {
            kind: Kind::Ended { parts: Some(parts) },
        }
    }
}

impl<F, B, E> Future for FilterFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<FilterBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().kind.project() {
            KindProj::Ended { parts } => {
                let parts = parts.take().expect("FilterFuture polled after completion");
                Poll::Ready(Ok(Response::from_parts(parts, FilterBody::empty())))
            }
            KindProj::Handler {
                inner,
                filters,
                request,
                staged,
            } => match inner.poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                Poll::Ready(Ok(response)) => Poll::Ready(Ok(run_after_handler(
                    response,
                    filters,
                    request,
                    mem::take(staged),
                ))),
            },
        }
    }
}

/// Applies staged headers and runs the after-handler hooks in reverse order.
fn run_after_handler<B>(
    response: Response<B>,
    filters: &Filters,
    request: &RequestInfo,
    staged: HeaderMap,
) -> Response<FilterBody<B>> {
    let (mut parts, body) = response.into_parts();
    parts.headers.extend(staged);

    let headers = mem::take(&mut parts.headers);
    let mut cx = ResponseContext::after_handler(request, parts.status, headers);
    for filter in filters.iter().rev() {
        filter.after_handler(&mut cx);
        if cx.is_ended() {
            break;
        }
    }
    let outcome = cx.into_outcome();
    parts.status = outcome.status;
    parts.headers = outcome.headers;

    let body = if outcome.discard_body {
        parts.headers.remove(header::CONTENT_LENGTH);
        FilterBody::empty()
    } else {
        FilterBody::handler(body)
    };

    Response::from_parts(parts, body)
}
