//! Per-request and per-response snapshots handed to a
//! [`MetadataLogger`](super::MetadataLogger).

use std::fmt;
use std::time::{Duration, SystemTime};

use http::header::{CONTENT_TYPE, USER_AGENT};

use crate::request::Request;

/// What the request looked like when it arrived.
///
/// Missing headers and an unknown peer are recorded as empty strings.
#[derive(Clone, Debug)]
pub struct RequestMetadata {
    pub method: String,
    pub path: String,
    pub remote_addr: String,
    pub user_agent: String,
    pub content_type: String,
    pub timestamp: SystemTime,
}

impl RequestMetadata {
    /// Snapshots `req` now. The request is only borrowed.
    pub fn capture(req: &Request) -> Self {
        Self {
            method: req.method().as_str().to_owned(),
            path: req.path().to_owned(),
            remote_addr: req.remote_addr().map(|a| a.to_string()).unwrap_or_default(),
            user_agent: req.header(USER_AGENT).unwrap_or_default().to_owned(),
            content_type: req.header(CONTENT_TYPE).unwrap_or_default().to_owned(),
            timestamp: SystemTime::now(),
        }
    }
}

/// What was handed to the client, measured once the response finished.
#[derive(Clone, Debug)]
pub struct ResponseMetadata {
    /// Status passed to the connection. `500` when the handler failed before
    /// producing a response.
    pub status: u16,
    /// Body bytes forwarded to the connection.
    pub content_length: u64,
    /// Time from request capture to the end of the response.
    pub duration: Duration,
    pub outcome: Outcome,
}

/// How a response ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The body was delivered in full.
    Completed,
    /// The handler panicked, or its body stream yielded an error.
    Failed,
    /// The request or response was dropped part-way (client disconnect,
    /// host cancellation).
    Cancelled,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed    => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn capture_copies_request_fields() {
        let before = SystemTime::now();
        let req = Request::builder()
            .method(Method::POST)
            .path("/patients")
            .header("user-agent", "probe/1.0")
            .header("content-type", "application/json")
            .remote_addr("192.0.2.10:40000".parse().unwrap())
            .body(&b"{}"[..]);

        let meta = RequestMetadata::capture(&req);

        assert_eq!(meta.method, "POST");
        assert_eq!(meta.path, "/patients");
        assert_eq!(meta.remote_addr, "192.0.2.10:40000");
        assert_eq!(meta.user_agent, "probe/1.0");
        assert_eq!(meta.content_type, "application/json");
        assert!(meta.timestamp >= before);
        // The snapshot leaves the request untouched.
        assert_eq!(req.body(), b"{}");
    }

    #[test]
    fn capture_fills_missing_fields_with_empty_strings() {
        let meta = RequestMetadata::capture(&Request::builder().build());
        assert_eq!(meta.method, "GET");
        assert_eq!(meta.path, "/");
        assert!(meta.remote_addr.is_empty());
        assert!(meta.user_agent.is_empty());
        assert!(meta.content_type.is_empty());
    }

    #[test]
    fn outcome_renders_lowercase() {
        assert_eq!(Outcome::Cancelled.to_string(), "cancelled");
    }
}
