use crate::models::user::{Role, User};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub fullname: String,
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    /// Chosen on the role-selection screen; admins are never self-registered.
    #[serde(default = "default_signup_role")]
    pub role: Role,
}

fn default_signup_role() -> Role {
    Role::Customer
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewPassword {
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Token and identity issued by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_requires_matching_passwords() {
        let request = RegisterRequest {
            fullname: "Jane Doe".into(),
            email: "jane@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
            role: Role::Customer,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn register_defaults_to_customer() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "fullname": "Jane Doe",
            "email": "jane@example.com",
            "password": "secret1",
            "confirmPassword": "secret1"
        }))
        .unwrap();
        assert_eq!(request.role, Role::Customer);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn login_rejects_short_password() {
        let request = LoginRequest {
            email: "jane@example.com".into(),
            password: "123".into(),
        };
        assert!(request.validate().is_err());
    }
}
