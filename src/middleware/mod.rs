//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the place for
//! cross-cutting concerns. httpshape ships one: sampled request/response
//! metadata capture.
//!
//! ```text
//! request ──► RequestMetadata::capture ──► sample? ──► handler ──► Response
//!                                                                   │
//!                     logger ◄── ResponseMetadata ◄── CaptureBody ◄─┘
//! ```
//!
//! [`instrument`] wraps any [`Handler`](crate::Handler) and returns another
//! one, so instrumented routes register like plain ones. What happens to the
//! metadata is up to the [`MetadataLogger`] you pass in: [`TracingLogger`]
//! emits `tracing` events, [`NullLogger`] drops everything, and tests plug in
//! their own spies.
//!
//! Unsampled requests still run through the capture path, but the logger
//! is never called for them.

mod capture;
mod instrument;
mod logger;
mod metadata;

pub use instrument::{Instrument, SampleRate, instrument};
pub use logger::{MetadataLogger, NullLogger, TracingLogger};
pub use metadata::{Outcome, RequestMetadata, ResponseMetadata};
