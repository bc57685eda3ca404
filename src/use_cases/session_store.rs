use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::auth::{AuthApi, AuthGrant};
use crate::domain::entities::{Session, SessionStatus, User};
use crate::domain::errors::{AppError, ClientError, ErrorKind};
use crate::domain::ports::CredentialBackend;
use crate::use_cases::classify::classify;
use crate::use_cases::credentials::CredentialStore;
use crate::use_cases::validation::{RegistrationProfile, validate_login, validate_registration};

/// A committed transition, tagged with the generation it produced.
///
/// Listeners run outside the state lock, so deliveries from transitions on
/// different threads may arrive out of order. A listener that keeps state
/// must ignore a change older than the last one it applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionChange {
    pub generation: u64,
    pub session: Session,
}

pub type Listener = Arc<dyn Fn(&SessionChange) + Send + Sync>;

// Handle returned by `subscribe`, used to detach the listener again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct SessionState {
    session: Session,
    // Bumped on every transition; exchanges started under an older value are stale.
    generation: u64,
}

/// Single owner of "who is logged in".
///
/// Every mutation goes through a named operation. Each operation takes the
/// state lock only for its synchronous part, persists the session mirror,
/// and notifies listeners after the lock is released.
pub struct AuthSessionStore<A, B> {
    api: A,
    credentials: CredentialStore<B>,
    state: Mutex<SessionState>,
    listeners: Mutex<Vec<(Subscription, Listener)>>,
    next_subscription: AtomicU64,
    session_tx: watch::Sender<Session>,
}

impl<A, B> AuthSessionStore<A, B>
where
    A: AuthApi,
    B: CredentialBackend,
{
    pub fn new(api: A, credentials: CredentialStore<B>) -> Self {
        let (session_tx, _session_rx) = watch::channel(Session::anonymous());
        Self {
            api,
            credentials,
            state: Mutex::new(SessionState {
                session: Session::anonymous(),
                generation: 0,
            }),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            session_tx,
        }
    }

    pub fn credentials(&self) -> &CredentialStore<B> {
        &self.credentials
    }

    pub fn session(&self) -> Session {
        self.lock_state().session.clone()
    }

    // Current session together with its generation, read atomically.
    pub fn current(&self) -> SessionChange {
        let state = self.lock_state();
        SessionChange {
            generation: state.generation,
            session: state.session.clone(),
        }
    }

    // Receiver for async dependents; always holds the latest session.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        let id = Subscription(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    #[tracing::instrument(name = "login", skip_all, fields(email = %email.trim()))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let req = validate_login(email, password)?;
        let generation = self.begin_exchange()?;
        let result = self.api.login(req).await;
        self.finish_exchange(generation, result)
    }

    #[tracing::instrument(
        name = "register",
        skip_all,
        fields(email = %profile.email.trim(), role = %profile.role)
    )]
    pub async fn register(&self, profile: &RegistrationProfile) -> Result<User, AppError> {
        let req = validate_registration(profile)?;
        let generation = self.begin_exchange()?;
        let result = self.api.register(req).await;
        self.finish_exchange(generation, result)
    }

    pub fn logout(&self) {
        self.reset(None);
    }

    /// Rebuilds the session from the persisted mirror without a network
    /// round trip. Returns the restored user, if any.
    pub fn restore_session(&self) -> Option<User> {
        let snapshot = {
            let mut state = self.lock_state();
            if state.session.status() != SessionStatus::Anonymous {
                debug!("session already active; skipping restore");
                return state.session.user().cloned();
            }

            let (token, user) = self.credentials.load_credentials();
            let token = token.filter(|token| !token.is_empty());
            let session = match (token, user) {
                (Some(token), Some(user)) => {
                    info!(user_id = %user.id, role = %user.role, "session restored");
                    Session::authenticated(user, token)
                }
                (None, None) => Session::anonymous(),
                _ => {
                    warn!("persisted credentials are incomplete; clearing them");
                    self.credentials.clear_credentials();
                    Session::anonymous()
                }
            };
            self.commit(&mut state, session)
        };

        self.notify(&snapshot);
        snapshot.session.user().cloned()
    }

    /// Validates the current token against the backend. Any failure logs
    /// the session out unless another transition happened meanwhile.
    #[tracing::instrument(name = "verify_session", skip_all)]
    pub async fn verify_session(&self) -> Result<User, AppError> {
        let (generation, token) = {
            let state = self.lock_state();
            match state.session.token() {
                Some(token) if state.session.is_authenticated() => {
                    (state.generation, token.to_string())
                }
                _ => return Err(AppError::new(ErrorKind::Auth, "no active session")),
            }
        };

        let user = match self.api.current_user(&token).await {
            Ok(user) => user,
            Err(err) => {
                let err = classify(err);
                warn!(kind = ?err.kind, status = ?err.status_code, "session verification failed");
                self.reset(Some(generation));
                return Err(err);
            }
        };

        let snapshot = {
            let mut state = self.lock_state();
            if state.generation != generation {
                return Err(superseded());
            }
            if state.session.user() == Some(&user) {
                return Ok(user);
            }
            info!(user_id = %user.id, "refreshed cached user profile");
            self.credentials.save_credentials(&token, &user);
            self.commit(&mut state, Session::authenticated(user.clone(), token))
        };

        self.notify(&snapshot);
        Ok(user)
    }

    /// Entry point for errors raised by other authenticated requests. An
    /// `Auth` failure means `token` was rejected, so the session it belongs
    /// to ends. Reports about a token the session no longer holds are ignored.
    pub fn report_error(&self, err: &AppError, token: &str) -> bool {
        if err.kind != ErrorKind::Auth {
            return false;
        }
        let generation = {
            let state = self.lock_state();
            if !state.session.is_authenticated() || state.session.token() != Some(token) {
                debug!("rejected token is not the active one; keeping session");
                return false;
            }
            state.generation
        };
        warn!(status = ?err.status_code, "token rejected by backend; logging out");
        self.reset(Some(generation))
    }

    fn begin_exchange(&self) -> Result<u64, AppError> {
        let (generation, snapshot) = {
            let mut state = self.lock_state();
            if state.session.status() == SessionStatus::Authenticating {
                return Err(AppError::validation("a sign-in is already in progress"));
            }
            // The mirror must not outlive the session it describes.
            self.credentials.clear_credentials();
            let snapshot = self.commit(&mut state, Session::authenticating());
            (snapshot.generation, snapshot)
        };

        self.notify(&snapshot);
        Ok(generation)
    }

    fn finish_exchange(
        &self,
        generation: u64,
        result: Result<AuthGrant, ClientError>,
    ) -> Result<User, AppError> {
        let (snapshot, outcome) = {
            let mut state = self.lock_state();
            if state.generation != generation {
                debug!(
                    generation,
                    current = state.generation,
                    "discarding stale credential exchange"
                );
                return Err(match result {
                    Ok(_) => superseded(),
                    Err(err) => classify(err),
                });
            }

            match result {
                Ok(grant) => {
                    info!(user_id = %grant.user.id, role = %grant.user.role, "signed in");
                    self.credentials.save_credentials(&grant.token, &grant.user);
                    let user = grant.user.clone();
                    let snapshot =
                        self.commit(&mut state, Session::authenticated(grant.user, grant.token));
                    (snapshot, Ok(user))
                }
                Err(err) => {
                    let err = classify(err);
                    warn!(kind = ?err.kind, status = ?err.status_code, "sign-in failed");
                    let snapshot = self.commit(&mut state, Session::anonymous());
                    (snapshot, Err(err))
                }
            }
        };

        self.notify(&snapshot);
        outcome
    }

    // Resets to Anonymous. With `expected`, only if no transition happened since.
    fn reset(&self, expected: Option<u64>) -> bool {
        let snapshot = {
            let mut state = self.lock_state();
            if expected.is_some_and(|generation| generation != state.generation) {
                debug!("session changed meanwhile; keeping it");
                return false;
            }
            self.credentials.clear_credentials();
            self.commit(&mut state, Session::anonymous())
        };

        info!("session cleared");
        self.notify(&snapshot);
        true
    }

    fn commit(&self, state: &mut SessionState, session: Session) -> SessionChange {
        state.generation += 1;
        state.session = session.clone();
        self.session_tx.send_replace(session.clone());
        SessionChange {
            generation: state.generation,
            session,
        }
    }

    fn notify(&self, change: &SessionChange) {
        // Clone the list so listeners may subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(change);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(Subscription, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn superseded() -> AppError {
    AppError::new(
        ErrorKind::Auth,
        "sign-in was superseded by a later session change",
    )
}
