use regex::Regex;
use std::sync::LazyLock;

use crate::domain::auth::{LoginRequest, RegisterRequest};
use crate::domain::entities::Role;
use crate::domain::errors::AppError;

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 100;
const NAME_MIN_LEN: usize = 2;
const NAME_MAX_LEN: usize = 50;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

// Form input for account registration.
#[derive(Clone, Debug)]
pub struct RegistrationProfile {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    pub role: Role,
}

pub fn validate_login(email: &str, password: &str) -> Result<LoginRequest, AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation("email is required"));
    }
    if password.is_empty() {
        return Err(AppError::validation("password is required"));
    }

    Ok(LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    })
}

pub fn validate_registration(profile: &RegistrationProfile) -> Result<RegisterRequest, AppError> {
    let login = validate_login(&profile.email, &profile.password)?;

    if !EMAIL_PATTERN.is_match(&login.email) {
        return Err(AppError::validation("email is not a valid address"));
    }

    let password_len = profile.password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password_len) {
        return Err(AppError::validation(format!(
            "password must be {PASSWORD_MIN_LEN} to {PASSWORD_MAX_LEN} characters"
        )));
    }

    let name = profile.name.trim();
    let name_len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) {
        return Err(AppError::validation(format!(
            "name must be {NAME_MIN_LEN} to {NAME_MAX_LEN} characters"
        )));
    }

    if profile.password != profile.confirm_password {
        return Err(AppError::validation("passwords don't match"));
    }

    Ok(RegisterRequest {
        email: login.email,
        password: login.password,
        name: name.to_string(),
        role: profile.role,
    })
}
