// Use cases layer: session lifecycle, routing and persistence workflows.

pub mod classify;
pub mod credentials;
pub mod route_guard;
pub mod session_store;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use classify::classify;
pub use credentials::{CredentialStore, StorageKey};
pub use route_guard::{
    Access, RouteDecision, RouteEntry, RouteTable, RouteWatcher, post_login_target, resolve,
};
pub use session_store::{AuthSessionStore, Listener, SessionChange, Subscription};
pub use validation::{RegistrationProfile, validate_login, validate_registration};
