//! Structured error types for browser-automation operations.

use mitchell_types::{Error, ErrorKind};
use thirtyfour::error::WebDriverError;
use thiserror::Error;

/// Specific error types for browser-driver and worker-pool operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to launch or attach to a `chromedriver`/WebDriver endpoint.
    #[error("failed to connect to WebDriver server at '{url}': {source}")]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The WebDriver endpoint itself returned an error.
    #[error("WebDriver error{}: {error}", context.as_ref().map(|c| format!(" during {c}")).unwrap_or_default())]
    WebDriverError {
        #[source]
        error: Box<WebDriverError>,
        context: Option<String>,
    },

    /// Login failed: missing form, bad credentials, or no redirect after
    /// submit.
    #[error("login failed: {reason}")]
    LoginFailed { reason: String },

    /// The portal reported that the account's concurrent-session limit is
    /// already in use.
    #[error("session limit reached for this account")]
    SessionLimit,

    /// An operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {duration_secs}s")]
    Timeout { operation: String, duration_secs: u64 },

    /// A browser-launch or capabilities configuration was invalid.
    #[error("configuration error{}: {message}", field.as_ref().map(|f| format!(" in '{f}'")).unwrap_or_default())]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Spawning or controlling the `chromedriver` child process failed.
    #[error("process '{operation}' failed{}: {message}", exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    ProcessError {
        operation: String,
        exit_code: Option<i32>,
        message: String,
    },

    /// An element could not be located or interacted with through any
    /// selector in the fallback chain.
    #[error("element operation '{operation}' failed{}: {reason}", selector.as_ref().map(|s| format!(" on selector '{s}'")).unwrap_or_default())]
    ElementError {
        operation: String,
        selector: Option<String>,
        reason: String,
    },

    /// Generic browser operation error not covered by a more specific
    /// variant.
    #[error("operation '{operation}' failed: {message}")]
    OperationFailed { operation: String, message: String },
}

impl BrowserError {
    pub fn connection_failed(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConnectionFailed {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn webdriver(error: WebDriverError, context: Option<String>) -> Self {
        Self::WebDriverError {
            error: Box::new(error),
            context,
        }
    }

    pub fn login_failed(reason: impl Into<String>) -> Self {
        Self::LoginFailed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_secs,
        }
    }

    pub fn configuration(message: impl Into<String>, field: Option<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field,
        }
    }

    pub fn process_error(
        operation: impl Into<String>,
        exit_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProcessError {
            operation: operation.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn element_error(
        operation: impl Into<String>,
        selector: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ElementError {
            operation: operation.into(),
            selector,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn operation_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns whether this error is generally worth retrying at the call
    /// site (not the same as the Reasoner's rate-limit retry policy).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::WebDriverError { .. }
            | Self::LoginFailed { .. }
            | Self::SessionLimit
            | Self::Configuration { .. }
            | Self::ProcessError { .. }
            | Self::ElementError { .. } => false,
            Self::OperationFailed { .. } => true,
        }
    }

    /// Maps this error onto the crate-wide [`ErrorKind`] closed set.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionFailed { .. }
            | Self::WebDriverError { .. }
            | Self::ProcessError { .. } => ErrorKind::ConnectionFailed,
            Self::LoginFailed { .. } => ErrorKind::LoginFailed,
            Self::SessionLimit => ErrorKind::SessionLimit,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Configuration { .. } => ErrorKind::ConfigInvalid,
            Self::ElementError { .. } => ErrorKind::NavigationStuck,
            Self::OperationFailed { .. } => ErrorKind::Other,
        }
    }
}

impl From<BrowserError> for Error {
    fn from(err: BrowserError) -> Self {
        Error::with_source(err.error_kind(), err.to_string(), Box::new(err))
    }
}

impl From<WebDriverError> for BrowserError {
    fn from(error: WebDriverError) -> Self {
        Self::WebDriverError {
            error: Box::new(error),
            context: None,
        }
    }
}

/// Type alias for `Result<T, BrowserError>`.
pub type BrowserResult<T> = Result<T, BrowserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_are_readable() {
        let error = BrowserError::timeout("page_load", 30);
        assert_eq!(
            error.to_string(),
            "operation 'page_load' timed out after 30s"
        );
    }

    #[test]
    fn retryability_matches_transient_vs_permanent() {
        assert!(
            BrowserError::connection_failed("http://localhost:9515", "connection refused")
                .is_retryable()
        );
        assert!(!BrowserError::configuration("bad capabilities", None).is_retryable());
        assert!(!BrowserError::SessionLimit.is_retryable());
    }

    #[test]
    fn converts_into_crate_wide_error_kind() {
        let err: Error = BrowserError::SessionLimit.into();
        assert_eq!(err.kind(), ErrorKind::SessionLimit);

        let err: Error = BrowserError::login_failed("missing password field").into();
        assert_eq!(err.kind(), ErrorKind::LoginFailed);
    }
}
