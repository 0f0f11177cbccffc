//! Response capture.
//!
//! [`CaptureBody`] sits between a handler's [`Body`] and the connection. Every
//! frame, the size hint and the end-of-stream flag pass through unchanged;
//! the only side effect is a running byte count. Nothing is buffered, so a
//! streamed response stays streamed.
//!
//! The per-request bookkeeping lives in [`Recorder`]. It is created when the
//! request arrives, moves into the capture body once the handler returns, and
//! finalizes exactly once:
//!
//! | Event                                   | Outcome     |
//! |-----------------------------------------|-------------|
//! | body reaches end of stream              | `Completed` |
//! | body yields an error, handler panics    | `Failed`    |
//! | future or body dropped before the end   | `Cancelled` |
//!
//! A HEAD response finishes as `Completed` with zero bytes when its body is
//! dropped, since the connection sends the head alone.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;
use http_body::{Body as HttpBody, Frame, SizeHint};

use super::logger::{MetadataLogger, deliver};
use super::metadata::{Outcome, RequestMetadata, ResponseMetadata};
use crate::body::Body;
use crate::error::Error;
use crate::response::Response;

/// Status reported when the handler never produced a response.
const NO_RESPONSE_STATUS: u16 = 500;

/// One request's in-flight metadata. Not reusable across requests.
pub(crate) struct Recorder {
    request: RequestMetadata,
    received: Instant,
    sampled: bool,
    logger: Arc<dyn MetadataLogger>,
    status: Option<StatusCode>,
    bytes: u64,
    head_only: bool,
    finished: bool,
}

impl Recorder {
    pub(crate) fn new(
        request: RequestMetadata,
        received: Instant,
        sampled: bool,
        logger: Arc<dyn MetadataLogger>,
    ) -> Self {
        let head_only = request.method == "HEAD";
        Self { request, received, sampled, logger, status: None, bytes: 0, head_only, finished: false }
    }

    /// Records the response head and wraps its body in a [`CaptureBody`].
    /// Status and headers are passed on untouched.
    pub(crate) fn attach(mut self, response: Response) -> Response {
        let (status, headers, body) = response.into_parts();
        self.status = Some(status);
        Response::from_parts(status, headers, Body::new(CaptureBody { inner: body, recorder: self }))
    }

    /// Builds the response metadata and, if sampled, reports both values.
    /// Later calls are no-ops.
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        if self.finished {
            return;
        }
        self.finished = true;

        let response = ResponseMetadata {
            status: self.status.map_or(NO_RESPONSE_STATUS, |s| s.as_u16()),
            content_length: self.bytes,
            duration: self.received.elapsed(),
            outcome,
        };

        if self.sampled {
            deliver(&*self.logger, &self.request, &response);
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.finish(Outcome::Cancelled);
    }
}

/// Pass-through body that counts what it forwards.
pub(crate) struct CaptureBody {
    inner: Body,
    recorder: Recorder,
}

impl HttpBody for CaptureBody {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.recorder.bytes += data.len() as u64;
                }
                // The connection stops polling once the inner body reports
                // end of stream, so this may be the last chance to finish.
                if this.inner.is_end_stream() {
                    this.recorder.finish(Outcome::Completed);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                this.recorder.finish(Outcome::Failed);
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.recorder.finish(Outcome::Completed);
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        // Neither an empty body nor the body of a HEAD response is ever
        // polled: once the head is out, the exchange is complete.
        if self.inner.is_end_stream() || self.recorder.head_only {
            self.recorder.finish(Outcome::Completed);
        }
    }
}
