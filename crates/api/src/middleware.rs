//! API middleware.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use hostelhub_core::{ComplaintService, UserService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub complaint_service: ComplaintService,
}

/// Authentication middleware.
///
/// Resolves a `Bearer` access token to a verified user row and stores it
/// in request extensions. Requests without a valid token pass through
/// unauthenticated; the extractors reject them where auth is required.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(user) = state.user_service.authenticate(token).await
    {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}
