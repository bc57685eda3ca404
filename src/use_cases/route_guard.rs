use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::domain::auth::AuthApi;
use crate::domain::entities::{Role, Session, SessionStatus, User};
use crate::domain::ports::CredentialBackend;
use crate::use_cases::session_store::{AuthSessionStore, SessionChange, Subscription};

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const HOME_PATH: &str = "/";

// Outcome of evaluating a navigation target against the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    RedirectToLogin { return_to: String },
    RedirectToUnauthorized,
    ShowLoading,
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    // An empty role list admits any authenticated user.
    Protected(Vec<Role>),
}

#[derive(Clone, Debug)]
pub struct RouteEntry {
    pub path: &'static str,
    pub access: Access,
}

/// Decides what to show for `route` given the current session.
pub fn resolve(session: &Session, route: &str, allowed_roles: Option<&[Role]>) -> RouteDecision {
    match session.status() {
        // Neither redirect nor render while a sign-in or restore is in flight.
        SessionStatus::Authenticating => RouteDecision::ShowLoading,
        SessionStatus::Anonymous => RouteDecision::RedirectToLogin {
            return_to: route.to_string(),
        },
        SessionStatus::Authenticated => match (allowed_roles, session.role()) {
            (Some(roles), Some(role)) if !roles.is_empty() && !roles.contains(&role) => {
                RouteDecision::RedirectToUnauthorized
            }
            _ => RouteDecision::Render,
        },
    }
}

/// Where to send a user right after signing in.
///
/// The remembered route wins when the user may see it; otherwise the
/// user's own dashboard.
pub fn post_login_target(table: &RouteTable, return_to: Option<&str>, user: &User) -> String {
    let session = Session::authenticated(user.clone(), String::new());
    return_to
        .filter(|path| !matches!(normalize(path), LOGIN_PATH | UNAUTHORIZED_PATH))
        .filter(|path| table.navigate(&session, path) == RouteDecision::Render)
        .map(str::to_string)
        .unwrap_or_else(|| user.role.dashboard_path().to_string())
}

// Fixed map from paths to access rules.
#[derive(Clone, Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    pub fn portal() -> Self {
        let mut entries = vec![
            RouteEntry {
                path: LOGIN_PATH,
                access: Access::Public,
            },
            RouteEntry {
                path: UNAUTHORIZED_PATH,
                access: Access::Public,
            },
            RouteEntry {
                path: HOME_PATH,
                access: Access::Protected(Vec::new()),
            },
        ];
        entries.extend(Role::ALL.into_iter().map(|role| RouteEntry {
            path: role.dashboard_path(),
            access: Access::Protected(vec![role]),
        }));
        Self::new(entries)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn lookup(&self, path: &str) -> Option<&RouteEntry> {
        let path = normalize(path);
        self.entries.iter().find(|entry| entry.path == path)
    }

    pub fn navigate(&self, session: &Session, path: &str) -> RouteDecision {
        match self.lookup(path) {
            None => RouteDecision::NotFound,
            Some(RouteEntry {
                access: Access::Public,
                ..
            }) => RouteDecision::Render,
            Some(RouteEntry {
                access: Access::Protected(roles),
                ..
            }) => resolve(session, path, Some(roles.as_slice())),
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::portal()
    }
}

// Drops query and fragment and any trailing slash except on the root.
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { HOME_PATH } else { trimmed }
}

struct WatchedRoute {
    path: String,
    session: Session,
    generation: u64,
}

/// Keeps the decision for the current route in sync with the session.
///
/// Registers a listener on the store, so every session transition pushes
/// a fresh decision to `decisions()` receivers. Changes older than the one
/// already applied are dropped, so a late delivery never overrides a newer
/// session.
pub struct RouteWatcher {
    table: Arc<RouteTable>,
    current: Arc<Mutex<WatchedRoute>>,
    decision_tx: Arc<watch::Sender<RouteDecision>>,
    subscription: Subscription,
}

impl RouteWatcher {
    pub fn attach<A, B>(store: &AuthSessionStore<A, B>, table: RouteTable, path: &str) -> Self
    where
        A: AuthApi,
        B: CredentialBackend,
    {
        let table = Arc::new(table);
        let SessionChange {
            generation,
            session,
        } = store.current();
        let (decision_tx, _decision_rx) = watch::channel(table.navigate(&session, path));
        let decision_tx = Arc::new(decision_tx);
        let current = Arc::new(Mutex::new(WatchedRoute {
            path: path.to_string(),
            session,
            generation,
        }));

        let subscription = store.subscribe({
            let table = table.clone();
            let current = current.clone();
            let decision_tx = decision_tx.clone();
            move |change: &SessionChange| apply_change(&table, &current, &decision_tx, change)
        });
        // Catch a transition committed between the first read and the subscribe.
        apply_change(&table, &current, &decision_tx, &store.current());

        Self {
            table,
            current,
            decision_tx,
            subscription,
        }
    }

    pub fn decisions(&self) -> watch::Receiver<RouteDecision> {
        self.decision_tx.subscribe()
    }

    pub fn decision(&self) -> RouteDecision {
        self.decision_tx.borrow().clone()
    }

    pub fn path(&self) -> String {
        self.lock_current().path.clone()
    }

    pub fn navigate_to(&self, path: &str) -> RouteDecision {
        let mut current = self.lock_current();
        current.path = path.to_string();
        let decision = self.table.navigate(&current.session, path);
        self.decision_tx.send_replace(decision.clone());
        decision
    }

    pub fn detach<A, B>(self, store: &AuthSessionStore<A, B>)
    where
        A: AuthApi,
        B: CredentialBackend,
    {
        store.unsubscribe(self.subscription);
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, WatchedRoute> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_change(
    table: &RouteTable,
    current: &Mutex<WatchedRoute>,
    decision_tx: &watch::Sender<RouteDecision>,
    change: &SessionChange,
) {
    let mut current = current.lock().unwrap_or_else(PoisonError::into_inner);
    if change.generation < current.generation {
        debug!(
            generation = change.generation,
            current = current.generation,
            "ignoring out-of-order session change"
        );
        return;
    }
    current.generation = change.generation;
    current.session = change.session.clone();
    let decision = table.navigate(&current.session, &current.path);
    debug!(path = %current.path, ?decision, "route re-evaluated");
    decision_tx.send_replace(decision);
}
