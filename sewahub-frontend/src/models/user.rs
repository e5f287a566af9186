use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The admin user form historically submitted `user` for customers.
    #[serde(alias = "user")]
    Customer,
    Provider,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Provider => "provider",
            Role::Admin => "admin",
        }
    }

    /// Where a freshly signed-in user of this role lands.
    pub fn landing_path(&self) -> &'static str {
        match self {
            Role::Customer => "/dashboard",
            Role::Provider => "/service-provider",
            Role::Admin => "/admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SewaHub account as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl User {
    /// Boundary check applied to every record received from the API.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.id.trim().is_empty() {
            return Err(invalid_record("missing id"));
        }
        if self.fullname.trim().is_empty() {
            return Err(invalid_record("missing fullname"));
        }
        if !self.email.contains('@') {
            return Err(invalid_record("invalid email"));
        }
        Ok(())
    }

    pub fn initials(&self) -> String {
        let mut parts = self.fullname.split_whitespace();
        let first = parts.next().and_then(|p| p.chars().next());
        let second = parts.next().and_then(|p| p.chars().next());
        match (first, second) {
            (Some(a), Some(b)) => format!("{}{}", a, b).to_uppercase(),
            (Some(a), None) => a.to_uppercase().to_string(),
            _ => "U".to_string(),
        }
    }

    /// Absolute avatar URL; relative upload paths are served by the API host.
    pub fn avatar_url(&self, public_base: &str) -> Option<String> {
        let image = self.image_url.as_deref()?;
        if image.starts_with("http") {
            Some(image.to_string())
        } else {
            Some(format!(
                "{}/{}",
                public_base.trim_end_matches('/'),
                image.trim_start_matches('/')
            ))
        }
    }
}

fn invalid_record(reason: &str) -> ApiError {
    ApiError::ServerRejected {
        status: 200,
        message: format!("Invalid user record: {}", reason),
    }
}

/// Partial profile update; absent fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub fullname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Enter a valid email"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none() && self.email.is_none() && self.location.is_none()
    }
}
