//! # httpshape
//!
//! A minimal hyper-based HTTP framework whose one cross-cutting feature is
//! sampled request/response metadata capture.
//!
//! ## The contract
//!
//! Handlers are plain `async fn(Request) -> impl IntoResponse`. Wrap any of
//! them with [`middleware::instrument`] and a fraction of its calls will
//! report a [`RequestMetadata`](middleware::RequestMetadata) and a
//! [`ResponseMetadata`](middleware::ResponseMetadata) to the
//! [`MetadataLogger`](middleware::MetadataLogger) of your choice. The wrapped
//! handler and its client cannot tell the difference. Status, headers and
//! every body byte pass through as they were produced.
//!
//! What the crate provides:
//!
//! - Radix-tree routing via [`matchit`]
//! - HTTP/1.1 and HTTP/2 via hyper, streamed response bodies
//! - Graceful shutdown on SIGTERM / Ctrl-C, draining in-flight requests
//! - Sampled metadata capture that survives handler panics and client
//!   disconnects
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use httpshape::{Request, Response, Router, Server, StatusCode};
//! use httpshape::middleware::{TracingLogger, instrument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), httpshape::Error> {
//!     let logger = Arc::new(TracingLogger);
//!     let app = Router::new()
//!         .get("/patients/{id}", instrument(get_patient, 0.1, logger.clone())?)
//!         .post("/patients", instrument(create_patient, 1.0, logger)?);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_patient(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_patient(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/patients/99")
//!         .json(br#"{"id":"99"}"#.to_vec())
//! }
//! ```

mod body;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use body::{Body, BodySender};
pub use error::Error;
pub use handler::Handler;
pub use http::{Method, StatusCode};
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
