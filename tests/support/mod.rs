// Mock portal backend shared by the integration tests.
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use portal_session::{Role, User};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

pub const PASSWORD: &str = "pw123456";
// Logins for this address stall longer than the short test client timeout.
pub const SLOW_EMAIL: &str = "slow@school.test";
// Logins for this address fail with a 500.
pub const BROKEN_EMAIL: &str = "broken@school.test";
// Registration with this address is refused with a 400.
pub const TAKEN_EMAIL: &str = "taken@school.test";

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

type Tokens = Arc<Mutex<HashMap<String, User>>>;

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    email: String,
    password: String,
    name: String,
    role: Role,
}

// Seeded accounts: one per role, named after the role.
fn seeded_user(email: &str) -> Option<User> {
    let (local, domain) = email.split_once('@')?;
    if domain != "school.test" {
        return None;
    }
    let role: Role = local.parse().ok()?;
    Some(User {
        id: format!("{}-1", role.as_str().to_uppercase()),
        email: email.to_string(),
        name: format!("Demo {local}"),
        role,
    })
}

fn error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": message })))
}

fn issue(tokens: &Tokens, user: User) -> Json<Value> {
    let token = uuid::Uuid::new_v4().to_string();
    tokens
        .lock()
        .expect("tokens mutex poisoned")
        .insert(token.clone(), user.clone());
    Json(json!({ "token": token, "user": user }))
}

async fn login(
    State(tokens): State<Tokens>,
    Json(body): Json<LoginBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if body.email == SLOW_EMAIL {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    if body.email == BROKEN_EMAIL {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
    }
    match seeded_user(&body.email) {
        Some(user) if body.password == PASSWORD => Ok(issue(&tokens, user)),
        _ => Err(error(StatusCode::UNAUTHORIZED, "invalid credentials")),
    }
}

async fn register(
    State(tokens): State<Tokens>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if body.email == TAKEN_EMAIL {
        return Err(error(StatusCode::BAD_REQUEST, "email already registered"));
    }
    if body.password.len() < 8 {
        return Err(error(StatusCode::BAD_REQUEST, "password too short"));
    }
    let user = User {
        id: format!("U-{}", uuid::Uuid::new_v4().simple()),
        email: body.email,
        name: body.name,
        role: body.role,
    };
    Ok(issue(&tokens, user))
}

async fn me(
    State(tokens): State<Tokens>,
    headers: HeaderMap,
) -> Result<Json<User>, (StatusCode, Json<Value>)> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "missing token"))?;
    let guard = tokens.lock().expect("tokens mutex poisoned");
    guard
        .get(token)
        .cloned()
        .map(Json)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "invalid session token"))
}

fn app() -> Router {
    let tokens: Tokens = Arc::new(Mutex::new(HashMap::new()));
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .with_state(tokens)
}

// Ensure the mock backend is running and return its API base URL.
pub fn ensure_backend() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{addr}/api"));
                axum::serve(listener, app()).await.expect("mock backend failed");
            });
        });
        wait_for_backend(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn wait_for_backend(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .and_then(|rest| rest.strip_suffix("/api"))
        .expect("base url should look like http://host:port/api");

    // Retry for a short period to avoid racing server bind/accept.
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("mock backend did not become ready in time");
}

// Address of a port nothing listens on, for connection-refused scenarios.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("get probe addr");
    drop(listener);
    format!("http://{addr}/api")
}
