use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::AppState;
use crate::auth;
use crate::models::user::{LoginRequest, RegisterRequest, UserResponse};

/// Create a session for a user and hand back the raw token. Only the hash
/// is persisted.
fn issue_session(state: &AppState, user_id: &str) -> Result<String, (StatusCode, String)> {
    let token = auth::generate_session_token();
    let expires_at = (chrono::Utc::now() + chrono::Duration::hours(state.auth.session_ttl_hours))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    state
        .store
        .create_session(&auth::hash_token(&token), user_id, &expires_at)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("db error: {e}")))?;
    Ok(token)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !req.email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "A valid email is required".to_string()));
    }
    if req.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let existing = state
        .store
        .get_user_by_email(&req.email)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("db error: {e}")))?;
    if existing.is_some() {
        return Err((
            StatusCode::BAD_REQUEST,
            "An account with this email already exists".to_string(),
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    state
        .store
        .create_user(&id, &req.email, &auth::hash_password(&req.password))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("db error: {e}")))?;
    let user = state
        .store
        .get_user(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("db error: {e}")))?
        .ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read created user".to_string(),
            )
        })?;

    let token = issue_session(&state, &user.id)?;
    Ok(Json(serde_json::json!({
        "user": UserResponse::from(user),
        "token": token,
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || (StatusCode::BAD_REQUEST, "Invalid login credentials".to_string());

    let user = state
        .store
        .get_user_by_email(&req.email)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("db error: {e}")))?
        .ok_or_else(invalid)?;
    if !auth::verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = issue_session(&state, &user.id)?;
    Ok(Json(serde_json::json!({
        "user": UserResponse::from(user),
        "token": token,
    })))
}

pub async fn signout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(token) = auth::bearer_token(&headers) {
        state
            .store
            .delete_session(&auth::hash_token(token))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("db error: {e}")))?;
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "view your account")?;
    Ok(Json(serde_json::json!({ "user": UserResponse::from(user) })))
}
