use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use db::{
    models::{keyword::KeywordError, task::TaskError, user::UserError},
    sync::SyncError,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Unauthenticated.")]
    Unauthenticated,
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Keyword(#[from] KeywordError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Task(err) => match err {
                TaskError::NotFound => StatusCode::NOT_FOUND,
                TaskError::CreatorNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
                TaskError::Sync(sync) => sync_status(sync),
                TaskError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Keyword(err) => match err {
                KeywordError::NotFound => StatusCode::NOT_FOUND,
                KeywordError::NameExists => StatusCode::UNPROCESSABLE_ENTITY,
                KeywordError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::User(err) => match err {
                UserError::NotFound => StatusCode::NOT_FOUND,
                UserError::EmailExists => StatusCode::UNPROCESSABLE_ENTITY,
                UserError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Sync(err) => sync_status(err),
            ApiError::Auth(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn sync_status(err: &SyncError) -> StatusCode {
    match err {
        // caller supplied an id that references nothing
        SyncError::KeywordNotFound(_) | SyncError::UserNotFound(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SyncError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed unexpectedly");
            // Internal tool: the raw error text is exposed on purpose.
            json!({ "message": "Unexpected error", "error": self.to_string() })
        } else {
            json!({ "message": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}
