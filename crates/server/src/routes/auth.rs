use axum::{extract::State, response::Json as ResponseJson, Extension, Json};
use db::models::{
    token::{ApiToken, AuthSession},
    user::User,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{auth, error::ApiError, AppState};

// Same message whether the email exists or the password is wrong.
const BAD_CREDENTIALS: &str = "The provided credentials are incorrect.";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_name: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<Value>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "The email and password fields are required.".to_string(),
        ));
    }

    let user = User::find_by_email(state.pool(), &payload.email)
        .await?
        .filter(|user| auth::verify_password(&payload.password, &user.password_hash));

    let Some(user) = user else {
        return Err(ApiError::Validation(BAD_CREDENTIALS.to_string()));
    };

    let device_name = payload.device_name.unwrap_or_else(|| "api".to_string());
    let token = auth::generate_token();
    ApiToken::create(
        state.pool(),
        user.id,
        &device_name,
        &auth::token_digest(&token),
        Uuid::new_v4(),
    )
    .await?;

    tracing::debug!(user_id = %user.id, %device_name, "issued api token");

    Ok(ResponseJson(json!({
        "access_token": token,
        "token_type": "Bearer",
        "user": { "id": user.id, "name": user.name, "email": user.email },
    })))
}

/// Revokes exactly the token that authenticated this call.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<ResponseJson<Value>, ApiError> {
    ApiToken::revoke(state.pool(), session.token_id).await?;
    Ok(ResponseJson(json!({ "message": "Token revoked." })))
}

pub async fn current_user(Extension(session): Extension<AuthSession>) -> ResponseJson<User> {
    ResponseJson(session.user)
}
