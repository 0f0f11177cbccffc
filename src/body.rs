//! Response body type.
//!
//! A [`Body`] is a boxed [`http_body::Body`] yielding [`Bytes`] frames. Most
//! handlers never see it: [`Response::json`](crate::Response::json) and
//! friends build a single-frame body for you. Handlers that want to write a
//! response piece by piece use [`Body::channel`] (or
//! [`ResponseBuilder::streaming`](crate::ResponseBuilder::streaming))
//! and push chunks through the returned [`BodySender`].
//!
//! Because the body is just a trait object, decorators such as the capture
//! adapter in [`middleware`](crate::middleware) can wrap it without touching
//! the bytes.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use http_body::{Frame, SizeHint};
use http_body_util::{BodyExt, Empty, Full, combinators::UnsyncBoxBody};
use tokio::sync::mpsc;

use crate::error::Error;

/// Chunks buffered between a [`BodySender`] and the connection before
/// `send` starts waiting.
const CHANNEL_CAPACITY: usize = 16;

// ── Body ──────────────────────────────────────────────────────────────────────

/// An outgoing response body.
pub struct Body(UnsyncBoxBody<Bytes, Error>);

impl Body {
    /// A body with no bytes. `is_end_stream` is true from the start.
    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new().map_err(|never| match never {}))
    }

    /// A body sent as one frame with an exact size hint, so the connection
    /// can emit `content-length`.
    pub fn full(bytes: impl Into<Bytes>) -> Self {
        Self::new(Full::new(bytes.into()).map_err(|never| match never {}))
    }

    /// A streamed body. Chunks pushed into the [`BodySender`] are delivered
    /// in order; dropping the sender ends the stream.
    pub fn channel() -> (BodySender, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (BodySender { tx }, Self::new(ChannelBody { rx }))
    }

    pub(crate) fn new<B>(body: B) -> Self
    where
        B: http_body::Body<Data = Bytes, Error = Error> + Send + 'static,
    {
        Self(body.boxed_unsync())
    }
}

impl Default for Body {
    fn default() -> Self { Self::empty() }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self { Self::full(v) }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self { Self::full(b) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::full(s) }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self::full(s) }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>> {
        http_body::Body::poll_frame(Pin::new(&mut self.0), cx)
    }

    fn is_end_stream(&self) -> bool {
        http_body::Body::is_end_stream(&self.0)
    }

    fn size_hint(&self) -> SizeHint {
        http_body::Body::size_hint(&self.0)
    }
}

// ── Streaming ─────────────────────────────────────────────────────────────────

/// Write half of a [`Body::channel`].
///
/// Typically moved into a spawned task that produces the response body after
/// the handler has already returned the head.
pub struct BodySender {
    tx: mpsc::Sender<Result<Bytes, Error>>,
}

impl BodySender {
    /// Queues one chunk. Fails with [`Error::BodyClosed`] once the receiving
    /// side is gone, which is how a handler learns the client went away.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> Result<(), Error> {
        self.tx.send(Ok(chunk.into())).await.map_err(|_| Error::BodyClosed)
    }

    /// Ends the stream with [`Error::BodyAborted`] instead of a clean EOF.
    /// The connection resets the response rather than finishing it.
    pub async fn abort(self) {
        let _ = self.tx.send(Err(Error::BodyAborted)).await;
    }
}

struct ChannelBody {
    rx: mpsc::Receiver<Result<Bytes, Error>>,
}

impl http_body::Body for ChannelBody {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>> {
        match ready!(self.rx.poll_recv(cx)) {
            Some(Ok(chunk)) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Some(Err(e))    => Poll::Ready(Some(Err(e))),
            None            => Poll::Ready(None),
        }
    }
}
