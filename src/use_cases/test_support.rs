use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::auth::{AuthApi, AuthGrant, LoginRequest, RegisterRequest};
use crate::domain::entities::{Role, User};
use crate::domain::errors::ClientError;
use crate::domain::ports::CredentialBackend;

pub(crate) fn user(id: &str, email: &str, name: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role,
    }
}

pub(crate) fn teacher() -> User {
    user("T-1", "teacher@school.test", "Demo Teacher", Role::Teacher)
}

pub(crate) fn grant(token: &str, user: User) -> AuthGrant {
    AuthGrant {
        token: token.to_string(),
        user,
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub get: bool,
    pub set: bool,
    pub remove: bool,
    pub clear: bool,
}

// In-memory backend that lets tests inspect exactly what was persisted.
#[derive(Clone, Default)]
pub(crate) struct RecordingBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
    failures: FailureFlags,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn insert_raw(&self, key: &str, value: &str) {
        let mut guard = self.entries.lock().expect("entries mutex poisoned");
        guard.insert(key.to_string(), value.to_string());
    }

    pub(crate) fn raw(&self, key: &str) -> Option<String> {
        let guard = self.entries.lock().expect("entries mutex poisoned");
        guard.get(key).cloned()
    }

    pub(crate) fn is_empty(&self) -> bool {
        let guard = self.entries.lock().expect("entries mutex poisoned");
        guard.is_empty()
    }
}

impl CredentialBackend for RecordingBackend {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        if self.failures.get {
            return Err("get failed".to_string());
        }
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        if self.failures.set {
            return Err("set failed".to_string());
        }
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        if self.failures.remove {
            return Err("remove failed".to_string());
        }
        let mut guard = self.entries.lock().expect("entries mutex poisoned");
        guard.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        if self.failures.clear {
            return Err("clear failed".to_string());
        }
        let mut guard = self.entries.lock().expect("entries mutex poisoned");
        guard.clear();
        Ok(())
    }
}

// Canned outcome of one credential exchange.
pub(crate) enum Reply {
    Grant(AuthGrant),
    Status(u16),
    NoResponse,
}

impl Reply {
    fn into_result(self) -> Result<AuthGrant, ClientError> {
        match self {
            Reply::Grant(grant) => Ok(grant),
            Reply::Status(status) => Err(ClientError::Status {
                status,
                message: None,
            }),
            Reply::NoResponse => Err(ClientError::NoResponse(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))),
        }
    }
}

#[derive(Default)]
struct Script {
    exchanges: Mutex<VecDeque<Reply>>,
    current_user: Mutex<VecDeque<Result<User, u16>>>,
    last_register: Mutex<Option<RegisterRequest>>,
    exchange_calls: AtomicUsize,
    current_user_calls: AtomicUsize,
    // When set, exchanges park here until the test calls `release`.
    gate: Option<Arc<Notify>>,
}

// Auth API fake replaying scripted replies in order.
#[derive(Clone, Default)]
pub(crate) struct ScriptedAuthApi {
    script: Arc<Script>,
}

impl ScriptedAuthApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // Must be called before the fake is cloned into a store.
    pub(crate) fn gated(mut self) -> Self {
        if let Some(script) = Arc::get_mut(&mut self.script) {
            script.gate = Some(Arc::new(Notify::new()));
        }
        self
    }

    pub(crate) fn with_exchange(self, reply: Reply) -> Self {
        self.script
            .exchanges
            .lock()
            .expect("script mutex poisoned")
            .push_back(reply);
        self
    }

    pub(crate) fn with_current_user(self, reply: Result<User, u16>) -> Self {
        self.script
            .current_user
            .lock()
            .expect("script mutex poisoned")
            .push_back(reply);
        self
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.script.gate {
            gate.notify_one();
        }
    }

    pub(crate) fn exchange_calls(&self) -> usize {
        self.script.exchange_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn current_user_calls(&self) -> usize {
        self.script.current_user_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_register(&self) -> Option<RegisterRequest> {
        self.script
            .last_register
            .lock()
            .expect("script mutex poisoned")
            .clone()
    }

    async fn next_exchange(&self) -> Result<AuthGrant, ClientError> {
        self.script.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.script.gate {
            gate.notified().await;
        }
        let reply = self
            .script
            .exchanges
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or(Reply::NoResponse);
        reply.into_result()
    }
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn login(&self, _req: LoginRequest) -> Result<AuthGrant, ClientError> {
        self.next_exchange().await
    }

    async fn register(&self, req: RegisterRequest) -> Result<AuthGrant, ClientError> {
        *self
            .script
            .last_register
            .lock()
            .expect("script mutex poisoned") = Some(req);
        self.next_exchange().await
    }

    async fn current_user(&self, _token: &str) -> Result<User, ClientError> {
        self.script.current_user_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .current_user
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or(Err(500));
        reply.map_err(|status| ClientError::Status {
            status,
            message: None,
        })
    }
}
