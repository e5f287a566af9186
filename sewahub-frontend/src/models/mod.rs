pub mod admin;
pub mod auth;
pub mod envelope;
pub mod user;

pub use auth::{AuthGrant, LoginRequest, NewPassword, PasswordResetRequest, RegisterRequest};
pub use envelope::{Envelope, Pagination};
pub use user::{ProfileUpdate, Role, User};
