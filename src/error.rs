use thiserror::Error;

/// Structured error type for every driver runtime operation.
///
/// Each variant maps to a WebDriver error code string plus an HTTP status,
/// so the wire layer can serialize failures without inspecting messages.
/// Variants carry owned strings and derive [`Clone`] because the shutdown
/// signal fans one error out to every in-flight command race.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// Session creation was rejected: a session already exists, the
    /// capabilities were malformed, or constraint validation failed.
    #[error("session not created: {0}")]
    SessionNotCreated(String),

    /// An operation required an active session and none exists, including
    /// the post-shutdown fast-fail path.
    #[error("{0}")]
    NoSuchDriver(String),

    /// The command name is not part of this driver's contract.
    #[error("method '{0}' has not yet been implemented")]
    NotYetImplemented(String),

    /// An execute-method name did not resolve to any registered method.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A request payload failed structural validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A locator strategy is not enabled for this session.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Malformed timeout values and generic internal failures.
    #[error("{0}")]
    Unknown(String),
}

impl DriverError {
    /// The driver was torn down outside of client control. Used both for
    /// the latch fast-fail and as the default unexpected-shutdown error.
    pub fn unexpected_shutdown() -> Self {
        DriverError::NoSuchDriver("the driver was unexpectedly shut down".into())
    }

    /// Error raised when the idle watchdog fires.
    pub fn new_command_timeout(timeout_ms: u64) -> Self {
        DriverError::Unknown(format!(
            "session did not receive a command within {:.1} seconds and was shut down. \
             Adjust the 'newCommandTimeout' capability to change this limit",
            timeout_ms as f64 / 1000.0,
        ))
    }

    /// Returns the WebDriver protocol error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            DriverError::SessionNotCreated(_) => "session not created",
            DriverError::NoSuchDriver(_) => "invalid session id",
            DriverError::NotYetImplemented(_) => "unknown method",
            DriverError::UnsupportedOperation(_) => "unsupported operation",
            DriverError::InvalidArgument(_) => "invalid argument",
            DriverError::InvalidSelector(_) => "invalid selector",
            DriverError::Unknown(_) => "unknown error",
        }
    }

    /// Returns the HTTP status a wire layer should respond with.
    pub fn http_status(&self) -> u16 {
        match self {
            DriverError::SessionNotCreated(_) => 500,
            DriverError::NoSuchDriver(_) => 404,
            DriverError::NotYetImplemented(_) => 405,
            DriverError::UnsupportedOperation(_) => 500,
            DriverError::InvalidArgument(_) => 400,
            DriverError::InvalidSelector(_) => 400,
            DriverError::Unknown(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
