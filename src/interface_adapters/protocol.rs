use serde::Deserialize;

// Error envelope the portal backend attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
