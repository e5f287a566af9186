use crate::error::ApiError;
use crate::models::{
    AuthGrant, LoginRequest, NewPassword, PasswordResetRequest, ProfileUpdate, RegisterRequest,
    User,
};
use crate::services::api_client::ApiClient;
use crate::services::endpoints;
use crate::session::IdentitySource;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

/// The SewaHub auth API as an [`IdentitySource`], plus the account flows
/// that do not touch the session (registration, password reset).
pub struct HttpIdentityClient {
    api: Arc<ApiClient>,
}

impl HttpIdentityClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<String, ApiError> {
        let body = json!({
            "fullname": request.fullname,
            "email": request.email,
            "password": request.password,
            "role": request.role,
        });
        let request = self.api.request(Method::POST, endpoints::REGISTER).json(&body);
        self.api
            .send_message(request, "Registration successful")
            .await
    }

    pub async fn request_password_reset(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<String, ApiError> {
        let request = self
            .api
            .request(Method::POST, endpoints::REQUEST_PASSWORD_RESET)
            .json(request);
        self.api
            .send_message(request, "If the email exists, a reset link has been sent")
            .await
    }

    pub async fn reset_password(
        &self,
        reset_token: &str,
        password: &NewPassword,
    ) -> Result<String, ApiError> {
        let path = endpoints::reset_password(reset_token)?;
        let request = self
            .api
            .request(Method::POST, &path)
            .json(&json!({ "newPassword": password.password }));
        self.api
            .send_message(request, "Password has been reset")
            .await
    }
}

#[async_trait]
impl IdentitySource for HttpIdentityClient {
    async fn authenticate(&self, credentials: &LoginRequest) -> Result<AuthGrant, ApiError> {
        let request = self
            .api
            .request(Method::POST, endpoints::LOGIN)
            .json(credentials);

        // A 401 here means rejected credentials rather than an expired token.
        let grant: AuthGrant = self.api.send_data(request).await?;

        if grant.token.is_empty() {
            return Err(ApiError::ServerRejected {
                status: 200,
                message: "Login response carried no token".to_string(),
            });
        }
        grant.user.validate()?;
        Ok(grant)
    }

    async fn who_am_i(&self, token: &str) -> Result<User, ApiError> {
        let request = self
            .api
            .request(Method::GET, endpoints::WHOAMI)
            .bearer_auth(token);
        self.api.send_data(request).await
    }

    async fn update_profile(&self, fields: &ProfileUpdate, token: &str) -> Result<User, ApiError> {
        let request = self
            .api
            .request(Method::PUT, endpoints::UPDATE_PROFILE)
            .bearer_auth(token)
            .json(fields);
        self.api.send_data(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiSettings;
    use crate::models::Role;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpIdentityClient {
        let api = ApiClient::new(ApiSettings {
            base_url: server.uri(),
            public_url: None,
            timeout_secs: 2,
        })
        .unwrap();
        HttpIdentityClient::new(Arc::new(api))
    }

    fn jane_json() -> serde_json::Value {
        json!({ "_id": "1", "fullname": "Jane Doe", "email": "jane@example.com", "role": "customer" })
    }

    #[tokio::test]
    async fn authenticate_returns_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({ "email": "jane@example.com", "password": "secret1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Login successful",
                "data": { "token": "abc", "user": jane_json() }
            })))
            .mount(&server)
            .await;

        let grant = client_for(&server)
            .authenticate(&LoginRequest {
                email: "jane@example.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();

        assert_eq!(grant.token, "abc");
        assert_eq!(grant.user.fullname, "Jane Doe");
        assert_eq!(grant.user.role, Role::Customer);
    }

    #[tokio::test]
    async fn bad_credentials_are_authentication_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false,
                "message": "Invalid credentials"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .authenticate(&LoginRequest {
                email: "jane@example.com".into(),
                password: "wrong-password".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Authentication("Invalid credentials".into()));
    }

    #[tokio::test]
    async fn who_am_i_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/whoami"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": jane_json()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server).who_am_i("abc").await.unwrap();
        assert_eq!(user.id, "1");
    }

    #[tokio::test]
    async fn update_profile_sends_only_present_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/auth/update-profile"))
            .and(body_json(json!({ "fullname": "Jane Smith" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Profile updated successfully",
                "data": { "_id": "1", "fullname": "Jane Smith", "email": "jane@example.com", "role": "customer" }
            })))
            .mount(&server)
            .await;

        let fields = ProfileUpdate {
            fullname: Some("Jane Smith".into()),
            ..Default::default()
        };
        let user = client_for(&server)
            .update_profile(&fields, "abc")
            .await
            .unwrap();
        assert_eq!(user.fullname, "Jane Smith");
    }

    #[tokio::test]
    async fn register_returns_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "message": "Account created"
            })))
            .mount(&server)
            .await;

        let message = client_for(&server)
            .register(&RegisterRequest {
                fullname: "Jane Doe".into(),
                email: "jane@example.com".into(),
                password: "secret1".into(),
                confirm_password: "secret1".into(),
                role: Role::Provider,
            })
            .await
            .unwrap();
        assert_eq!(message, "Account created");
    }
}
