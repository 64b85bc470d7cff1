//! Staff administration endpoints (admin only).

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use hostelhub_common::{AppError, AppResult};
use hostelhub_core::CallerContext;
use serde::Deserialize;
use tracing::info;

use crate::{
    endpoints::auth::UserResponse, extractors::Caller, middleware::AppState,
    response::ApiResponse,
};

/// Create admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(pending_users))
        .route("/approve/{id}", put(approve_user))
        .route("/staff", get(staff))
        .route("/staff/{id}/role", put(set_staff_role))
}

fn require_admin(caller: &CallerContext) -> AppResult<()> {
    match caller {
        CallerContext::Admin { .. } => Ok(()),
        CallerContext::Student { .. }
        | CallerContext::SubAdmin { .. }
        | CallerContext::Caretaker { .. } => Err(AppError::Forbidden(
            "Access denied. Admin only.".to_string(),
        )),
    }
}

/// List response.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: u64,
}

/// Management accounts awaiting approval.
async fn pending_users(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserListResponse>> {
    require_admin(&caller)?;

    let users: Vec<UserResponse> = state
        .user_service
        .pending_management()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    let total = users.len() as u64;

    Ok(ApiResponse::ok(UserListResponse { users, total }))
}

/// Approve a management account.
async fn approve_user(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    require_admin(&caller)?;

    info!(admin_id = %caller.id(), user_id = %id, "Approving management account");

    let user = state.user_service.approve(&id).await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// All management accounts.
async fn staff(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserListResponse>> {
    require_admin(&caller)?;

    let users: Vec<UserResponse> = state
        .user_service
        .staff()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    let total = users.len() as u64;

    Ok(ApiResponse::ok(UserListResponse { users, total }))
}

/// Role assignment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRoleRequest {
    pub management_role: String,
    pub specialization: Option<String>,
}

/// Set a staff member's sub-role and specialization.
async fn set_staff_role(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    require_admin(&caller)?;

    info!(
        admin_id = %caller.id(),
        user_id = %id,
        role = %req.management_role,
        "Updating staff role"
    );

    let user = state
        .user_service
        .set_role(&id, &req.management_role, req.specialization.as_deref())
        .await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}
