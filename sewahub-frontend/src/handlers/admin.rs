use crate::middleware::auth::AdminUser;
use crate::models::admin::{
    page_window, CreateUserRequest, PageLink, UpdateUserRequest, UserListParams, UserQuery,
};
use crate::models::{Envelope, User};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use validator::Validate;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub pages: Vec<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

pub async fn list_users_handler(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(params): Query<UserListParams>,
) -> Result<Json<Envelope<UserListResponse>>, AppError> {
    let query = UserQuery::from(params);
    let page = state.admin.list_users(&query, &admin.token).await?;

    let response = UserListResponse {
        pages: page_window(page.pagination.current_page, page.pagination.total_pages),
        users: page.users,
        search: query.search,
    };
    Ok(Json(
        Envelope::ok("Get all users successful", response).with_pagination(page.pagination),
    ))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<User>>, AppError> {
    let user = state.admin.get_user(&id, &admin.token).await?;
    Ok(Json(Envelope::ok("User fetched", user)))
}

pub async fn create_user_handler(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Envelope<User>>), AppError> {
    payload.validate()?;
    let user = state.admin.create_user(&payload, &admin.token).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok("User created successfully", user)),
    ))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Envelope<User>>, AppError> {
    payload.validate()?;
    let user = state.admin.update_user(&id, &payload, &admin.token).await?;

    // An admin editing their own record sees the change immediately.
    if user.id == admin.user.id {
        admin.session.apply_user_update(user.clone()).await?;
    }

    Ok(Json(Envelope::ok("User updated successfully", user)))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    if id == admin.user.id {
        return Err(AppError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }
    let message = state.admin.delete_user(&id, &admin.token).await?;
    Ok(Json(Envelope::message(message)))
}
