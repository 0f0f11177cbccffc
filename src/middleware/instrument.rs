//! The instrumentation decorator.

use std::fmt;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use super::capture::Recorder;
use super::logger::MetadataLogger;
use super::metadata::{Outcome, RequestMetadata};
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::request::Request;
use crate::response::Response;

// ── SampleRate ────────────────────────────────────────────────────────────────

/// Fraction of requests whose metadata reaches the logger, in `[0.0, 1.0]`.
///
/// Parses from strings (`"0.25".parse()`), so it can come straight from an
/// environment variable. Out-of-range values and NaN are rejected rather
/// than clamped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRate(f64);

impl SampleRate {
    pub const ALWAYS: Self = Self(1.0);
    pub const NEVER: Self = Self(0.0);

    pub fn get(self) -> f64 { self.0 }

    /// Draws once from the calling thread's generator and compares against
    /// the rate. The generator is seeded from OS entropy once per thread, so
    /// concurrent requests never contend on, or corrupt, shared state.
    pub fn sample(self) -> bool {
        rand::random::<f64>() < self.0
    }
}

impl TryFrom<f64> for SampleRate {
    type Error = Error;

    fn try_from(rate: f64) -> Result<Self, Error> {
        if (0.0..=1.0).contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(Error::Config(format!("sample rate must be within [0.0, 1.0], got {rate}")))
        }
    }
}

impl FromStr for SampleRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let rate: f64 = s
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("sample rate `{s}` is not a number: {e}")))?;
        Self::try_from(rate)
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Instrument ────────────────────────────────────────────────────────────────

/// Wraps a handler, capturing request and response metadata for a sampled
/// fraction of calls.
///
/// Per call:
/// 1. snapshot the request into [`RequestMetadata`] and start the clock;
/// 2. draw the sample decision;
/// 3. run the wrapped handler;
/// 4. wrap the response body so its bytes are counted as they go out;
/// 5. when the body finishes, report both values to the logger if sampled.
///
/// If the handler panics, the metadata gathered so far is reported first and
/// the original panic is then resumed, untouched.
///
/// `Instrument` is itself a [`Handler`]: register it on a
/// [`Router`](crate::Router) directly, or use the [`instrument`] shorthand.
pub struct Instrument {
    inner: BoxedHandler,
    sample_rate: SampleRate,
    logger: Arc<dyn MetadataLogger>,
}

impl Instrument {
    /// Fails with [`Error::Config`] when `sample_rate` is outside `[0.0, 1.0]`.
    pub fn new(
        handler: impl Handler,
        sample_rate: f64,
        logger: Arc<dyn MetadataLogger>,
    ) -> Result<Self, Error> {
        let sample_rate = SampleRate::try_from(sample_rate)?;
        Ok(Self::with_rate(handler, sample_rate, logger))
    }

    /// Like [`new`](Self::new) with an already-validated rate.
    pub fn with_rate(
        handler: impl Handler,
        sample_rate: SampleRate,
        logger: Arc<dyn MetadataLogger>,
    ) -> Self {
        Self { inner: handler.into_boxed_handler(), sample_rate, logger }
    }

    pub fn sample_rate(&self) -> SampleRate { self.sample_rate }

    /// Runs one request through the wrapped handler.
    pub async fn call(&self, req: Request) -> Response {
        let mut recorder = Recorder::new(
            RequestMetadata::capture(&req),
            Instant::now(),
            self.sample_rate.sample(),
            Arc::clone(&self.logger),
        );

        match AssertUnwindSafe(Arc::clone(&self.inner).call(req)).catch_unwind().await {
            Ok(response) => recorder.attach(response),
            Err(panic) => {
                recorder.finish(Outcome::Failed);
                drop(recorder);
                resume_unwind(panic)
            }
        }
    }
}

impl private::Sealed for Instrument {}

impl Handler for Instrument {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

impl ErasedHandler for Instrument {
    fn call(self: Arc<Self>, req: Request) -> BoxFuture {
        Box::pin(async move { Instrument::call(&self, req).await })
    }
}

/// Wraps `handler` so a `sample_rate` fraction of its requests are reported
/// to `logger`.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use httpshape::{Request, Response, Router};
/// use httpshape::middleware::{TracingLogger, instrument};
///
/// async fn list(_req: Request) -> Response { Response::json(b"[]".to_vec()) }
///
/// # fn main() -> Result<(), httpshape::Error> {
/// let app = Router::new().get("/patients", instrument(list, 0.1, Arc::new(TracingLogger))?);
/// # Ok(())
/// # }
/// ```
pub fn instrument(
    handler: impl Handler,
    sample_rate: f64,
    logger: Arc<dyn MetadataLogger>,
) -> Result<impl Handler, Error> {
    Instrument::new(handler, sample_rate, logger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_inside_the_unit_interval_are_accepted() {
        for rate in [0.0, 0.001, 0.5, 1.0] {
            assert_eq!(SampleRate::try_from(rate).unwrap().get(), rate);
        }
    }

    #[test]
    fn rates_outside_the_unit_interval_are_rejected() {
        for rate in [-0.1, 1.0001, f64::NAN, f64::INFINITY] {
            assert!(matches!(SampleRate::try_from(rate), Err(Error::Config(_))));
        }
    }

    #[test]
    fn rates_parse_from_strings() {
        assert_eq!(" 0.25 ".parse::<SampleRate>().unwrap().get(), 0.25);
        assert!(matches!("lots".parse::<SampleRate>(), Err(Error::Config(_))));
        assert!(matches!("2".parse::<SampleRate>(), Err(Error::Config(_))));
    }

    #[test]
    fn bounds_are_absolute() {
        for _ in 0..1_000 {
            assert!(SampleRate::ALWAYS.sample());
            assert!(!SampleRate::NEVER.sample());
        }
    }

    #[test]
    fn half_rate_converges() {
        let rate = SampleRate::try_from(0.5).unwrap();
        let hits = (0..10_000).filter(|_| rate.sample()).count();
        let fraction = hits as f64 / 10_000.0;
        assert!((0.45..=0.55).contains(&fraction), "observed {fraction}");
    }

    #[tokio::test]
    async fn registers_on_a_router_like_any_handler() {
        async fn ok(_req: Request) -> Response { Response::text("ok") }
        let logger: Arc<dyn MetadataLogger> = Arc::new(crate::middleware::NullLogger);
        let router = crate::Router::new().get("/patients", Instrument::new(ok, 1.0, logger).unwrap());

        let (handler, _) = router.lookup(&http::Method::GET, "/patients").unwrap();
        let res = handler.call(Request::builder().path("/patients").build()).await;
        assert_eq!(res.status_code(), http::StatusCode::OK);
    }

    #[test]
    fn construction_rejects_bad_rates() {
        async fn noop(_req: Request) -> Response { Response::text("") }
        let logger: Arc<dyn MetadataLogger> = Arc::new(crate::middleware::NullLogger);
        assert!(Instrument::new(noop, 1.5, Arc::clone(&logger)).is_err());
        assert!(instrument(noop, -1.0, logger).is_err());
    }
}
