//! Unified error type.

use std::fmt;

/// The error type returned by httpshape's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures (binding a port, accepting a connection), invalid
/// configuration, and streamed bodies that ended badly.
#[derive(Debug)]
pub enum Error {
    /// Socket-level failure.
    Io(std::io::Error),
    /// Rejected configuration value, e.g. a sample rate outside `[0.0, 1.0]`.
    Config(String),
    /// The handler aborted a streamed body before finishing it.
    BodyAborted,
    /// The receiving side of a streamed body is gone (client disconnected).
    BodyClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)      => write!(f, "io: {e}"),
            Self::Config(m)  => write!(f, "config: {m}"),
            Self::BodyAborted => f.write_str("body: stream aborted by handler"),
            Self::BodyClosed  => f.write_str("body: receiver closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_keep_their_source() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "io: taken");
    }

    #[test]
    fn config_errors_render_their_message() {
        let err = Error::Config("sample rate must be within [0.0, 1.0], got 2".into());
        assert!(err.to_string().starts_with("config: sample rate"));
        assert!(std::error::Error::source(&err).is_none());
    }
}
