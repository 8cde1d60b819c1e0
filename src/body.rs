use crate::compact::Compactor;
use crate::sink::WhitespaceSink;
use bytes::buf::Writer;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A response body that may be whitespace-compacted.
    ///
    /// This type wraps an inner body and either buffers and compacts it or
    /// passes it through unchanged.
    #[project = WhitespaceBodyProj]
    #[allow(missing_docs)]
    pub enum WhitespaceBody<B> {
        /// Body buffered into a whitespace sink and emitted once complete.
        Compacted {
            #[pin]
            inner: B,
            state: CompactedBody,
        },
        /// Body passed through untouched.
        Passthrough {
            #[pin]
            inner: B,
        },
    }
}

/// State for a body that is being compacted.
pub(crate) struct CompactedBody {
    sink: WhitespaceSink<Writer<BytesMut>>,
    state: DrainState,
    pending_trailers: Option<http::HeaderMap>,
}

/// State machine for compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainState {
    /// Reading data from the inner body into the sink.
    Buffering,
    /// Inner body is done; close the sink and emit its output.
    Draining,
    /// Emitting buffered trailers.
    Trailers,
    /// Body is complete.
    Done,
}

impl CompactedBody {
    fn new(compactor: Compactor) -> Self {
        Self {
            sink: WhitespaceSink::new(BytesMut::new().writer(), compactor),
            state: DrainState::Buffering,
            pending_trailers: None,
        }
    }

    /// Returns the current drain state.
    pub(crate) fn state(&self) -> DrainState {
        self.state
    }

    /// Moves past draining once the sink output has been taken.
    fn finish_draining(&mut self) {
        self.state = if self.pending_trailers.is_some() {
            DrainState::Trailers
        } else {
            DrainState::Done
        };
    }

    fn poll_compacted<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.state {
                DrainState::Done => return Poll::Ready(None),

                DrainState::Trailers => {
                    self.state = DrainState::Done;
                    if let Some(trailers) = self.pending_trailers.take() {
                        return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                    }
                    return Poll::Ready(None);
                }

                DrainState::Draining => {
                    if let Err(e) = self.sink.close() {
                        self.state = DrainState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    let output = self.sink.get_mut().get_mut().split().freeze();
                    self.finish_draining();
                    if !output.is_empty() {
                        return Poll::Ready(Some(Ok(Frame::data(output))));
                    }
                }

                DrainState::Buffering => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        self.state = DrainState::Draining;
                    }
                    Poll::Ready(Some(Err(e))) => {
                        // Buffered text is dropped rather than emitted half-way.
                        self.sink.discard();
                        self.state = DrainState::Done;
                        return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(mut data) => {
                            while data.has_remaining() {
                                let chunk = data.chunk();
                                let len = chunk.len();
                                self.sink.write_all(chunk)?;
                                data.advance(len);
                            }
                        }
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                self.pending_trailers = Some(trailers);
                                self.state = DrainState::Draining;
                            }
                        }
                    },
                },
            }
        }
    }
}

impl<B> WhitespaceBody<B> {
    /// Creates a body that is compacted with `compactor` once it ends.
    pub fn compacted(inner: B, compactor: Compactor) -> Self {
        Self::Compacted {
            inner,
            state: CompactedBody::new(compactor),
        }
    }

    /// Creates a passthrough body.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }
}

impl<B> Body for WhitespaceBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            WhitespaceBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => {
                    Poll::Ready(Some(Ok(frame.map_data(into_bytes))))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
            },
            WhitespaceBodyProj::Compacted { inner, state } => state.poll_compacted(cx, inner),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            WhitespaceBody::Passthrough { inner } => inner.is_end_stream(),
            WhitespaceBody::Compacted { state, .. } => state.state() == DrainState::Done,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            WhitespaceBody::Passthrough { inner } => inner.size_hint(),
            // Compacted size is unknown until the body has ended
            WhitespaceBody::Compacted { .. } => http_body::SizeHint::default(),
        }
    }
}

/// Copies a possibly non-contiguous buffer into `Bytes`.
fn into_bytes<D: Buf>(mut data: D) -> Bytes {
    data.copy_to_bytes(data.remaining())
}
