//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use bytes::Bytes;
use http_body_util::BodyExt;
use httpshape::middleware::{Instrument, MetadataLogger, RequestMetadata, ResponseMetadata};
use httpshape::{Request, StatusCode};

/// Records every metadata value it is handed.
#[derive(Default)]
pub struct Spy {
    requests: Mutex<Vec<RequestMetadata>>,
    responses: Mutex<Vec<ResponseMetadata>>,
}

impl Spy {
    pub fn requests(&self) -> Vec<RequestMetadata> {
        self.requests.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<ResponseMetadata> {
        self.responses.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len() + self.responses.lock().unwrap().len()
    }
}

impl MetadataLogger for Spy {
    fn log_request(&self, request: &RequestMetadata) {
        self.requests.lock().unwrap().push(request.clone());
    }

    fn log_response(&self, response: &ResponseMetadata) {
        self.responses.lock().unwrap().push(response.clone());
    }
}

/// Runs `req` through `instrument` and drains the response body, the way a
/// connection would.
pub async fn drive(instrument: &Instrument, req: Request) -> (StatusCode, Bytes) {
    let res = instrument.call(req).await;
    let status = res.status_code();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}
