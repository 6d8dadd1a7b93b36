use std::convert::Infallible;
use std::{fmt, io};

/// Type-erased source error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error kind representing the category of failure that occurred.
///
/// Mirrors the closed error-kind table the system is specified against:
/// each kind maps to one row of that table and carries the same
/// recoverability/visibility contract described there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal configuration error at startup.
    ConfigInvalid,

    /// A configured job server could not be reached for a sweep.
    ServerUnreachable,

    /// Failed to launch, attach to, or otherwise control a browser process.
    ConnectionFailed,

    /// Login to the portal failed (bad credentials, missing form).
    LoginFailed,

    /// The portal reported that the account's session limit is in use.
    SessionLimit,

    /// The Navigator could not complete vehicle selection within its budget.
    NavigationStuck,

    /// An unknown tool name or malformed tool parameters.
    ToolDispatchError,

    /// The Reasoner backend was rate-limited and retries were exhausted.
    ReasonerRateLimited,

    /// The Reasoner backend returned something other than a valid tool call.
    ReasonerProtocolError,

    /// Submitting a result back to the origin server failed.
    SubmitResultFailed,

    /// HTTP-layer errors not otherwise classified above.
    Http,

    /// I/O errors (file system, process spawn).
    Io,

    /// An operation exceeded its deadline.
    Timeout,

    /// Any other unclassified error.
    Other,
}

impl ErrorKind {
    /// Returns a string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "config_invalid",
            Self::ServerUnreachable => "server_unreachable",
            Self::ConnectionFailed => "connection_failed",
            Self::LoginFailed => "login_failed",
            Self::SessionLimit => "session_limit",
            Self::NavigationStuck => "navigation_stuck",
            Self::ToolDispatchError => "tool_dispatch_error",
            Self::ReasonerRateLimited => "reasoner_rate_limited",
            Self::ReasonerProtocolError => "reasoner_protocol_error",
            Self::SubmitResultFailed => "submit_result_failed",
            Self::Http => "http",
            Self::Io => "io",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crate-wide error type shared by every component of the agent.
///
/// # Examples
///
/// ```
/// use mitchell_types::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::LoginFailed, "missing password field");
/// assert_eq!(err.kind(), ErrorKind::LoginFailed);
/// assert_eq!(err.to_string(), "[login_failed] missing password field");
/// ```
#[must_use]
#[derive(thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new [`Error`] with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new [`Error`] with the given kind, message, and source error.
    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: BoxError) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns the error kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message, without the kind prefix `Display` adds.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this error's kind is recoverable at the Request level,
    /// i.e. it should be surfaced on the `AgentResult` rather than aborting
    /// the sweep or the service.
    pub const fn is_request_scoped(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ConnectionFailed
                | ErrorKind::LoginFailed
                | ErrorKind::SessionLimit
                | ErrorKind::NavigationStuck
                | ErrorKind::ToolDispatchError
                | ErrorKind::ReasonerRateLimited
                | ErrorKind::ReasonerProtocolError
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug
            .field("kind", &self.kind)
            .field("message", &self.message);

        if let Some(ref source) = self.source {
            debug.field("source", source);
        }

        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<BoxError> for Error {
    #[inline]
    fn from(value: BoxError) -> Self {
        Self::with_source(ErrorKind::Other, value.to_string(), value)
    }
}

impl From<Infallible> for Error {
    #[inline]
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::with_source(ErrorKind::Io, "I/O error", Box::new(error))
    }
}

impl From<reqwest::Error> for Error {
    #[inline]
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Http
        };
        Self::with_source(kind, "HTTP request failed", Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_prefix() {
        let err = Error::new(ErrorKind::SessionLimit, "sessions are currently in use");
        assert_eq!(
            err.to_string(),
            "[session_limit] sessions are currently in use"
        );
    }

    #[test]
    fn request_scoped_classification() {
        assert!(Error::new(ErrorKind::LoginFailed, "x").is_request_scoped());
        assert!(!Error::new(ErrorKind::ConfigInvalid, "x").is_request_scoped());
        assert!(!Error::new(ErrorKind::ServerUnreachable, "x").is_request_scoped());
    }

    #[test]
    fn from_io_error_sets_io_kind() {
        let io_err = io::Error::from(io::ErrorKind::NotFound);
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
