use std::sync::Arc;

use crate::domain::errors::{AppError, ClientError, ErrorKind, SharedCause};

const AUTH_MESSAGE: &str = "Authentication failed. Please log in again.";
const VALIDATION_MESSAGE: &str = "Invalid request. Please check your input.";
const SERVER_MESSAGE: &str = "Server error. Please try again later.";
const NETWORK_MESSAGE: &str = "Network error. Please check your connection.";
const UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// Maps a transport failure to the application error taxonomy.
///
/// First match wins: an existing `AppError` passes through untouched, then
/// 401/403, 400 and 5xx statuses, then failures that never got a response.
/// Everything else is `Unknown`. The original failure is kept as the cause.
pub fn classify(err: ClientError) -> AppError {
    let (kind, message, status_code) = match err {
        ClientError::App(app) => return app,
        ClientError::Status { status, .. } => match status {
            401 | 403 => (ErrorKind::Auth, AUTH_MESSAGE, Some(status)),
            400 => (ErrorKind::Validation, VALIDATION_MESSAGE, Some(status)),
            500.. => (ErrorKind::Server, SERVER_MESSAGE, Some(status)),
            _ => (ErrorKind::Unknown, UNKNOWN_MESSAGE, None),
        },
        ClientError::NoResponse(_) => (ErrorKind::Network, NETWORK_MESSAGE, None),
        ClientError::Other(_) => (ErrorKind::Unknown, UNKNOWN_MESSAGE, None),
    };

    let cause: SharedCause = Arc::new(err);
    AppError {
        message: message.to_string(),
        kind,
        status_code,
        cause: Some(cause),
    }
}
