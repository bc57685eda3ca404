use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::domain::entities::User;
use crate::domain::ports::CredentialBackend;

// Keys of the persisted namespace. Only the first two belong to the session core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKey {
    AuthToken,
    UserData,
    Theme,
    Language,
    LastRoute,
}

impl StorageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::AuthToken => "auth_token",
            StorageKey::UserData => "user_data",
            StorageKey::Theme => "theme",
            StorageKey::Language => "language",
            StorageKey::LastRoute => "last_route",
        }
    }
}

/// Typed, best-effort access to durable key-value entries.
///
/// Reads never fail: a missing entry, a backend error and unparsable
/// content all read as absent. Writes and removals log failures instead of
/// returning them.
pub struct CredentialStore<B> {
    backend: B,
}

impl<B> CredentialStore<B>
where
    B: CredentialBackend,
{
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn get_string(&self, key: StorageKey) -> Option<String> {
        match self.backend.get(key.as_str()) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "failed to read storage entry");
                None
            }
        }
    }

    pub fn get_json<T>(&self, key: StorageKey) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let raw = self.get_string(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "discarding unparsable storage entry");
                None
            }
        }
    }

    pub fn get_or_default<T>(&self, key: StorageKey, default: T) -> T
    where
        T: DeserializeOwned,
    {
        self.get_json(key).unwrap_or(default)
    }

    pub fn set_string(&self, key: StorageKey, value: &str) {
        if let Err(err) = self.backend.set(key.as_str(), value) {
            warn!(key = key.as_str(), error = %err, "failed to write storage entry");
        }
    }

    pub fn set_json<T>(&self, key: StorageKey, value: &T)
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_string(key, &raw),
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "failed to serialize storage entry");
            }
        }
    }

    pub fn remove(&self, key: StorageKey) {
        if let Err(err) = self.backend.remove(key.as_str()) {
            warn!(key = key.as_str(), error = %err, "failed to remove storage entry");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.backend.clear() {
            warn!(error = %err, "failed to clear storage");
        }
    }

    // Session mirror helpers used by the auth session store.

    pub fn load_credentials(&self) -> (Option<String>, Option<User>) {
        (
            self.get_string(StorageKey::AuthToken),
            self.get_json(StorageKey::UserData),
        )
    }

    pub fn save_credentials(&self, token: &str, user: &User) {
        self.set_string(StorageKey::AuthToken, token);
        self.set_json(StorageKey::UserData, user);
    }

    pub fn clear_credentials(&self) {
        self.remove(StorageKey::AuthToken);
        self.remove(StorageKey::UserData);
    }
}
