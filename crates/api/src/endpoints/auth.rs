//! Authentication endpoints.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use hostelhub_common::AppResult;
use hostelhub_core::RegisterInput;
use hostelhub_db::entities::user;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
}

/// User response, without credential fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: user::UserRole,
    pub hostel: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
    pub is_approved: bool,
    pub is_admin: bool,
    pub management_role: Option<user::ManagementRole>,
    pub specialization: Option<hostelhub_db::entities::complaint::ComplaintCategory>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            hostel: user.hostel,
            block: user.block,
            room_number: user.room_number,
            is_approved: user.is_approved,
            is_admin: user.is_admin,
            management_role: user.management_role,
            specialization: user.specialization,
            created_at: user.created_at,
        }
    }
}

/// Register request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    pub hostel: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
}

/// Register a new account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .register(RegisterInput {
            email: req.email,
            password: req.password,
            role: req.role,
            hostel: req.hostel,
            block: req.block,
            room_number: req.room_number,
        })
        .await?;

    info!(user_id = %user.id, role = ?user.role, "Registered new account");

    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// Login request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login / refresh response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Verify credentials and issue tokens.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let outcome = state.user_service.login(&req.email, &req.password).await?;

    info!(user_id = %outcome.user.id, "User logged in");

    Ok(ApiResponse::ok(SessionResponse {
        user: UserResponse::from(outcome.user),
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
    }))
}

/// Refresh request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Rotate a refresh token.
async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let outcome = state.user_service.refresh(&req.refresh_token).await?;

    Ok(ApiResponse::ok(SessionResponse {
        user: UserResponse::from(outcome.user),
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
    }))
}

/// The authenticated caller's own record.
async fn me(AuthUser(user): AuthUser) -> AppResult<ApiResponse<UserResponse>> {
    Ok(ApiResponse::ok(UserResponse::from(user)))
}
