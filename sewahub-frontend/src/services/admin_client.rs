use crate::error::ApiError;
use crate::models::admin::{CreateUserRequest, UpdateUserRequest, UserQuery};
use crate::models::{Pagination, User};
use crate::services::api_client::ApiClient;
use crate::services::endpoints;
use reqwest::{Method, StatusCode};
use std::sync::Arc;

/// One page of the admin user table.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPage {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

/// Admin user-management endpoints. Every call carries the admin's token.
pub struct AdminUserClient {
    api: Arc<ApiClient>,
}

impl AdminUserClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list_users(&self, query: &UserQuery, token: &str) -> Result<UserPage, ApiError> {
        let request = self
            .api
            .request(Method::GET, endpoints::ADMIN_USERS)
            .bearer_auth(token)
            .query(query);

        let envelope = self.api.send(request).await?;
        let users: Vec<User> = match envelope.data {
            Some(data) => serde_json::from_value(data).map_err(|e| {
                ApiError::rejected(StatusCode::OK, format!("Malformed user list: {}", e))
            })?,
            None => Vec::new(),
        };

        // Older API builds omit pagination; describe the single page we got.
        let pagination = envelope.pagination.unwrap_or(Pagination {
            current_page: query.page,
            total_pages: 1,
            total_users: users.len() as u64,
            page_size: query.size,
        });

        tracing::debug!(
            page = pagination.current_page,
            total = pagination.total_users,
            "Fetched user page"
        );
        Ok(UserPage { users, pagination })
    }

    pub async fn get_user(&self, id: &str, token: &str) -> Result<User, ApiError> {
        let request = self
            .api
            .request(Method::GET, &endpoints::admin_user(id)?)
            .bearer_auth(token);
        self.api.send_data(request).await
    }

    pub async fn create_user(
        &self,
        user: &CreateUserRequest,
        token: &str,
    ) -> Result<User, ApiError> {
        let request = self
            .api
            .request(Method::POST, endpoints::CREATE_ADMIN_USER)
            .bearer_auth(token)
            .json(user);
        let created: User = self.api.send_data(request).await?;
        tracing::info!(user_id = %created.id, role = %created.role, "Admin created user");
        Ok(created)
    }

    pub async fn update_user(
        &self,
        id: &str,
        changes: &UpdateUserRequest,
        token: &str,
    ) -> Result<User, ApiError> {
        let request = self
            .api
            .request(Method::PUT, &endpoints::admin_user(id)?)
            .bearer_auth(token)
            .json(changes);
        let updated: User = self.api.send_data(request).await?;
        tracing::info!(user_id = %updated.id, "Admin updated user");
        Ok(updated)
    }

    pub async fn delete_user(&self, id: &str, token: &str) -> Result<String, ApiError> {
        let request = self
            .api
            .request(Method::DELETE, &endpoints::admin_user(id)?)
            .bearer_auth(token);
        let message = self
            .api
            .send_message(request, "User deleted successfully")
            .await?;
        tracing::info!(user_id = %id, "Admin deleted user");
        Ok(message)
    }
}
