// Domain layer: session entities, error taxonomy and ports.

pub mod auth;
pub mod entities;
pub mod errors;
pub mod ports;

pub use auth::{AuthApi, AuthGrant, LoginRequest, RegisterRequest};
pub use entities::{Role, Session, SessionStatus, User};
pub use errors::{AppError, BoxError, ClientError, ErrorKind, SharedCause, UserAction};
pub use ports::CredentialBackend;
