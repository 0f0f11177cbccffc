//! The logging capability the middleware reports to.
//!
//! The middleware never formats anything itself. It hands the two metadata
//! values to a [`MetadataLogger`] and forgets about them. Bring your own sink
//! (file, metrics, test spy) by implementing the trait; two are built in.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{info, warn};

use super::metadata::{RequestMetadata, ResponseMetadata};

/// Receives metadata for sampled requests.
///
/// Called concurrently from every in-flight request; the middleware does not
/// serialize calls. For one request, `log_request` is always called right
/// before `log_response`, and neither is called at all when the request was
/// not sampled.
///
/// Implementations should not panic. If one does, the panic is caught, the
/// entry is dropped, and the request carries on unaffected.
pub trait MetadataLogger: Send + Sync + 'static {
    fn log_request(&self, request: &RequestMetadata);
    fn log_response(&self, response: &ResponseMetadata);
}

/// Emits one `tracing` event per metadata value under the
/// `httpshape::access` target.
///
/// Responses with a status of 400 or above are logged at `WARN`, everything
/// else at `INFO`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl MetadataLogger for TracingLogger {
    fn log_request(&self, request: &RequestMetadata) {
        info!(
            target: "httpshape::access",
            method = %request.method,
            path = %request.path,
            remote_addr = %request.remote_addr,
            user_agent = %request.user_agent,
            content_type = %request.content_type,
            timestamp = ?request.timestamp,
            "request received"
        );
    }

    fn log_response(&self, response: &ResponseMetadata) {
        let duration_ms = response.duration.as_secs_f64() * 1000.0;
        if response.status >= 400 {
            warn!(
                target: "httpshape::access",
                status = response.status,
                content_length = response.content_length,
                duration_ms,
                outcome = %response.outcome,
                "response finished"
            );
        } else {
            info!(
                target: "httpshape::access",
                status = response.status,
                content_length = response.content_length,
                duration_ms,
                outcome = %response.outcome,
                "response finished"
            );
        }
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLogger;

impl MetadataLogger for NullLogger {
    fn log_request(&self, _request: &RequestMetadata) {}
    fn log_response(&self, _response: &ResponseMetadata) {}
}

/// Hands both values to `logger`, absorbing any panic it raises.
pub(crate) fn deliver(
    logger: &dyn MetadataLogger,
    request: &RequestMetadata,
    response: &ResponseMetadata,
) {
    let delivered = catch_unwind(AssertUnwindSafe(|| {
        logger.log_request(request);
        logger.log_response(response);
    }));
    if delivered.is_err() {
        warn!(
            method = %request.method,
            path = %request.path,
            "metadata logger panicked, entry dropped"
        );
    }
}
