//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{AsHeaderName, HeaderMap, HeaderName, HeaderValue};
use http::Method;

/// An incoming HTTP request with its body already read.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Builder for requests constructed outside the server (tests, embedding).
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            inner: Request {
                method: Method::GET,
                path: "/".to_owned(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
                params: HashMap::new(),
                remote_addr: None,
            },
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Peer address of the connection, when the request came off a socket.
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// are treated as absent.
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Fluent builder for [`Request`]. Defaults to `GET /` with no headers.
pub struct RequestBuilder {
    inner: Request,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.inner.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.inner.path = path.into();
        self
    }

    /// Appends a header. Invalid names or values are dropped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.inner.headers.append(name, value);
            }
            _ => tracing::warn!(header = name, "dropping invalid request header"),
        }
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.inner.params.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.inner.remote_addr = Some(addr);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Request {
        self.inner.body = body.into();
        self.inner
    }

    pub fn build(self) -> Request {
        self.inner
    }
}
