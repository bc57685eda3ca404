use crate::domain::errors::{AppError, ErrorKind};
use crate::frameworks::config::Environment;

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

// Full detail, including the cause chain, is only logged outside production.
pub fn log_error(err: &AppError, environment: Environment) {
    match environment {
        Environment::Development => tracing::error!(
            reason = %err.message,
            code = err.kind.code(),
            status = ?err.status_code,
            cause = ?err.cause,
            "request failed"
        ),
        Environment::Production if err.kind == ErrorKind::Unknown => tracing::error!(
            reason = %err.message,
            code = err.kind.code(),
            "request failed"
        ),
        Environment::Production => tracing::warn!(
            reason = %err.message,
            code = err.kind.code(),
            status = ?err.status_code,
            "request failed"
        ),
    }
}
