use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{Role, User};
use crate::domain::errors::ClientError;

// The serialization within this layer is a dependency leak, but its a pragmatic approach
// Credential exchange payload for login.
#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Credential exchange payload for registration.
#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

// Success body of both credential exchanges.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
}

// The session store depends on this trait, not the concrete client implementation.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, req: LoginRequest) -> Result<AuthGrant, ClientError>;

    async fn register(&self, req: RegisterRequest) -> Result<AuthGrant, ClientError>;

    // Bootstrap lookup used to validate a restored token.
    async fn current_user(&self, token: &str) -> Result<User, ClientError>;
}
