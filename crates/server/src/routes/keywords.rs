use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
    Extension, Json, Router,
};
use db::{
    models::{
        keyword::{CreateKeyword, Keyword},
        task::Task,
    },
    sync::{self, KeywordSelection, SyncMode},
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{error::ApiError, middleware::load_keyword_middleware, AppState};

const NAME_MAX: usize = 255;

pub async fn list_keywords(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<Keyword>>, ApiError> {
    let keywords = Keyword::find_all(state.pool()).await?;
    Ok(ResponseJson(keywords))
}

pub async fn get_keyword(Extension(keyword): Extension<Keyword>) -> ResponseJson<Keyword> {
    ResponseJson(keyword)
}

pub async fn create_keyword(
    State(state): State<AppState>,
    Json(payload): Json<CreateKeyword>,
) -> Result<(StatusCode, ResponseJson<Value>), ApiError> {
    validate_name(&payload.name)?;

    let keyword = Keyword::create(state.pool(), &payload, Uuid::new_v4()).await?;
    Ok((StatusCode::CREATED, ResponseJson(json!({ "data": keyword }))))
}

pub async fn update_keyword(
    Extension(keyword): Extension<Keyword>,
    State(state): State<AppState>,
    Json(payload): Json<CreateKeyword>,
) -> Result<ResponseJson<Value>, ApiError> {
    validate_name(&payload.name)?;

    let keyword = Keyword::update_name(state.pool(), keyword.id, &payload.name).await?;
    Ok(ResponseJson(json!({ "data": keyword })))
}

pub async fn delete_keyword(
    Extension(keyword): Extension<Keyword>,
    State(state): State<AppState>,
) -> Result<ResponseJson<Value>, ApiError> {
    Keyword::delete(state.pool(), keyword.id).await?;
    Ok(ResponseJson(
        json!({ "message": "Keyword deleted successfully." }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AttachKeywordsRequest {
    #[serde(flatten)]
    pub selection: KeywordSelection,
    #[serde(default)]
    pub sync: bool,
}

/// `POST /tasks/{id}/keywords` — attach by default, replace when `sync=true`.
pub async fn attach_to_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
    Json(payload): Json<AttachKeywordsRequest>,
) -> Result<ResponseJson<Value>, ApiError> {
    let mode = if payload.sync {
        SyncMode::Sync
    } else {
        SyncMode::Attach
    };
    reconcile(&state, &task, &payload.selection, mode).await
}

/// `PATCH /tasks/{id}/keywords` — always a replacing sync.
pub async fn sync_for_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
    Json(selection): Json<KeywordSelection>,
) -> Result<ResponseJson<Value>, ApiError> {
    reconcile(&state, &task, &selection, SyncMode::Sync).await
}

async fn reconcile(
    state: &AppState,
    task: &Task,
    selection: &KeywordSelection,
    mode: SyncMode,
) -> Result<ResponseJson<Value>, ApiError> {
    validate_selection(selection)?;

    let keywords = sync::reconcile_keywords(state.pool(), task.id, selection, mode).await?;
    Ok(ResponseJson(json!({ "data": keywords })))
}

/// `DELETE /tasks/{id}/keywords/{keywordId}` — both endpoints must exist,
/// but a missing link is fine: detach is idempotent.
pub async fn detach_from_task(
    State(state): State<AppState>,
    Path((task_id, keyword_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<Value>, ApiError> {
    let task = Task::find_by_id(state.pool(), task_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    let keyword = Keyword::find_by_id(state.pool(), keyword_id)
        .await?
        .ok_or(ApiError::NotFound("Keyword"))?;

    sync::detach_keyword(state.pool(), task.id, keyword.id).await?;
    Ok(ResponseJson(json!({ "message": "Keyword detached from task" })))
}

pub(super) fn validate_selection(selection: &KeywordSelection) -> Result<(), ApiError> {
    for name in &selection.names {
        validate_name(name)?;
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation(
            "The name field is required.".to_string(),
        ));
    }
    if name.chars().count() > NAME_MAX {
        return Err(ApiError::Validation(format!(
            "The name may not be greater than {NAME_MAX} characters."
        )));
    }
    Ok(())
}

pub fn router(state: &AppState) -> Router<AppState> {
    let keyword_id_router = Router::new()
        .route(
            "/",
            get(get_keyword).patch(update_keyword).delete(delete_keyword),
        )
        .layer(from_fn_with_state(state.clone(), load_keyword_middleware));

    let inner = Router::new()
        .route("/", get(list_keywords).post(create_keyword))
        .nest("/{keyword_id}", keyword_id_router);

    Router::new().nest("/keywords", inner)
}
