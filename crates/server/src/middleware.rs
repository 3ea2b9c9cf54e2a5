use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::Request as HttpRequest,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use db::models::{keyword::Keyword, task::Task, token::ApiToken};
use uuid::Uuid;

use crate::{auth, error::ApiError, AppState};

/// Resolves the bearer token to an [`AuthSession`] extension, or rejects the
/// request with 401.
///
/// [`AuthSession`]: db::models::token::AuthSession
pub async fn require_token(
    State(state): State<AppState>,
    mut req: HttpRequest<Body>,
    next: Next,
) -> Response {
    let bearer = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => bearer,
        None => return ApiError::Unauthenticated.into_response(),
    };

    let digest = auth::token_digest(bearer.token());
    match ApiToken::find_session_by_digest(state.pool(), &digest).await {
        Ok(Some(session)) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Ok(None) => ApiError::Unauthenticated.into_response(),
        Err(err) => {
            tracing::error!("failed to resolve bearer token: {}", err);
            ApiError::Database(err).into_response()
        }
    }
}

pub async fn load_task_middleware(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let task = match Task::find_by_id(state.pool(), task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            tracing::warn!("Task {} not found", task_id);
            return Err(ApiError::NotFound("Task"));
        }
        Err(e) => {
            tracing::error!("Failed to fetch task {}: {}", task_id, e);
            return Err(ApiError::Database(e));
        }
    };

    request.extensions_mut().insert(task);
    Ok(next.run(request).await)
}

pub async fn load_keyword_middleware(
    State(state): State<AppState>,
    Path(keyword_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let keyword = match Keyword::find_by_id(state.pool(), keyword_id).await {
        Ok(Some(keyword)) => keyword,
        Ok(None) => {
            tracing::warn!("Keyword {} not found", keyword_id);
            return Err(ApiError::NotFound("Keyword"));
        }
        Err(e) => {
            tracing::error!("Failed to fetch keyword {}: {}", keyword_id, e);
            return Err(ApiError::Database(e));
        }
    };

    request.extensions_mut().insert(keyword);
    Ok(next.run(request).await)
}
