use crate::domain::{AppError, Role, User, UserAction};
use crate::frameworks::config::{Environment, PortalConfig};
use crate::frameworks::logging::{init_tracing, log_error};
use crate::interface_adapters::clients::HttpAuthApi;
use crate::interface_adapters::storage::FileBackend;
use crate::use_cases::{
    AuthSessionStore, CredentialStore, RegistrationProfile, RouteDecision, RouteTable,
    StorageKey, post_login_target,
};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

type PortalStore = AuthSessionStore<HttpAuthApi, FileBackend>;

#[derive(Parser, Debug)]
#[command(name = "portal", version, about = "School portal session client")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in with it
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long)]
        name: String,
        /// admin, teacher, student or parent
        #[arg(long)]
        role: Role,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Check the stored token against the backend
    Verify,
    /// Show what the portal would display for a path
    Route { path: String },
}

pub async fn run() -> ExitCode {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = CliArgs::parse();

    let config = match PortalConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(api_url = %config.api_url, state_path = %config.state_path.display(), "portal client configured.");

    let api = match HttpAuthApi::new(config.api_url.clone(), config.http_timeout) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!(error = %e, "failed to build http client");
            return ExitCode::FAILURE;
        }
    };
    let store = AuthSessionStore::new(
        api,
        CredentialStore::new(FileBackend::new(&config.state_path)),
    );
    store.restore_session();

    match execute(&store, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, config.environment);
            ExitCode::FAILURE
        }
    }
}

async fn execute(store: &PortalStore, command: Command) -> Result<(), AppError> {
    let table = RouteTable::portal();

    match command {
        Command::Login { email, password } => {
            let user = store.login(&email, &password).await?;
            announce_sign_in(store, &table, &user);
        }
        Command::Register {
            email,
            password,
            confirm_password,
            name,
            role,
        } => {
            let profile = RegistrationProfile {
                email,
                password,
                confirm_password,
                name,
                role,
            };
            let user = store.register(&profile).await?;
            announce_sign_in(store, &table, &user);
        }
        Command::Logout => {
            store.logout();
            println!("signed out");
        }
        Command::Whoami => {
            let session = store.session();
            match session.user() {
                Some(user) => println!("{} <{}> ({})", user.name, user.email, user.role),
                None => println!("not signed in"),
            }
        }
        Command::Verify => {
            let user = store.verify_session().await?;
            println!("session valid for {} ({})", user.email, user.role);
        }
        Command::Route { path } => {
            let decision = table.navigate(&store.session(), &path);
            // Remember where the user was headed so login can send them back.
            if let RouteDecision::RedirectToLogin { return_to } = &decision {
                store.credentials().set_json(StorageKey::LastRoute, return_to);
            }
            println!("{}", describe(&decision));
        }
    }

    Ok(())
}

fn announce_sign_in(store: &PortalStore, table: &RouteTable, user: &User) {
    let credentials = store.credentials();
    let return_to = credentials.get_json::<String>(StorageKey::LastRoute);
    let target = post_login_target(table, return_to.as_deref(), user);
    credentials.remove(StorageKey::LastRoute);
    println!("signed in as {} ({}); continue at {target}", user.name, user.role);
}

fn describe(decision: &RouteDecision) -> String {
    match decision {
        RouteDecision::Render => "render".to_string(),
        RouteDecision::RedirectToLogin { return_to } => {
            format!("redirect to /login (return to {return_to})")
        }
        RouteDecision::RedirectToUnauthorized => "redirect to /unauthorized".to_string(),
        RouteDecision::ShowLoading => "loading".to_string(),
        RouteDecision::NotFound => "not found".to_string(),
    }
}

fn report(err: &AppError, environment: Environment) {
    log_error(err, environment);
    eprintln!("{} [{}]", err.message, err.kind.code());
    if let Some(text) = hint(err.kind.user_action()) {
        eprintln!("{text}");
    }
}

fn hint(action: UserAction) -> Option<&'static str> {
    match action {
        UserAction::Relogin => Some("sign in again with `portal login`"),
        UserAction::FixInput => Some("check the values you entered"),
        UserAction::Retry => Some("try again in a moment"),
        UserAction::Dismiss => None,
    }
}
