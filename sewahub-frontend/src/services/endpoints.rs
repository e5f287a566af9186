//! Paths on the SewaHub REST API.

use crate::error::ApiError;

pub const LOGIN: &str = "/api/auth/login";
pub const REGISTER: &str = "/api/auth/register";
pub const WHOAMI: &str = "/api/auth/whoami";
pub const UPDATE_PROFILE: &str = "/api/auth/update-profile";
pub const REQUEST_PASSWORD_RESET: &str = "/api/auth/request-password-reset";
pub const ADMIN_USERS: &str = "/api/admin/users";
pub const CREATE_ADMIN_USER: &str = "/api/admin/users/";

pub fn reset_password(token: &str) -> Result<String, ApiError> {
    Ok(format!("/api/auth/reset-password/{}", segment(token)?))
}

pub fn admin_user(id: &str) -> Result<String, ApiError> {
    Ok(format!("{}/{}", ADMIN_USERS, segment(id)?))
}

/// Ids and tokens are interpolated into paths, so only URL-safe characters
/// are accepted.
fn segment(value: &str) -> Result<&str, ApiError> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && value != "."
        && value != "..";
    if safe {
        Ok(value)
    } else {
        Err(ApiError::Validation(format!("Invalid identifier '{}'", value)))
    }
}
