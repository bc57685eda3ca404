pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use domain::{AppError, ErrorKind, Role, Session, SessionStatus, User};
pub use frameworks::cli::run;
pub use use_cases::{AuthSessionStore, RouteDecision, RouteTable, classify, resolve};
