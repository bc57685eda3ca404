use std::error::Error as StdError;
use std::sync::Arc;

pub type BoxError = Box<dyn StdError + Send + Sync>;
pub type SharedCause = Arc<dyn StdError + Send + Sync>;

// Application error taxonomy surfaced to callers of the session core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Auth,
    Validation,
    Server,
    Unknown,
}

// What the UI should offer the user for a given error kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
    Relogin,
    FixInput,
    Retry,
    Dismiss,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Server => "SERVER_ERROR",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }

    pub fn user_action(self) -> UserAction {
        match self {
            ErrorKind::Auth => UserAction::Relogin,
            ErrorKind::Validation => UserAction::FixInput,
            ErrorKind::Server | ErrorKind::Network => UserAction::Retry,
            ErrorKind::Unknown => UserAction::Dismiss,
        }
    }
}

/// Classified failure handed back to the caller for display.
///
/// Built once by the classifier or by input validation and never mutated
/// afterwards. The cause is reference counted so the error stays `Clone`.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    pub message: String,
    pub kind: ErrorKind,
    pub status_code: Option<u16>,
    #[source]
    pub cause: Option<SharedCause>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            status_code: None,
            cause: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_cause(mut self, cause: SharedCause) -> Self {
        self.cause = Some(cause);
        self
    }
}

// Failure reported by the transport layer before classification.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    App(#[from] AppError),
    #[error("upstream responded with status {status}")]
    Status {
        status: u16,
        message: Option<String>,
    },
    // Connection refused, DNS failure, timeout: nothing came back.
    #[error("no response from upstream: {0}")]
    NoResponse(#[source] BoxError),
    #[error("unexpected client failure: {0}")]
    Other(#[source] BoxError),
}
