use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, patch},
    Extension, Json, Router,
};
use db::models::{
    task::{CreateTask, Task, UpdateTask},
    token::AuthSession,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{error::ApiError, middleware::load_task_middleware, AppState};

use super::keywords;

const TITLE_MAX: usize = 255;
const PRIORITY_MAX: usize = 50;

pub async fn list_tasks(State(state): State<AppState>) -> Result<ResponseJson<Vec<Task>>, ApiError> {
    let tasks = Task::find_all(state.pool()).await?;
    Ok(ResponseJson(tasks))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<Value>, ApiError> {
    let task = Task::with_relations(state.pool(), task.id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    Ok(ResponseJson(json!(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(payload): Json<CreateTask>,
) -> Result<(StatusCode, ResponseJson<Value>), ApiError> {
    validate_title(&payload.title)?;
    validate_priority(payload.priority.as_deref())?;
    if let Some(selection) = &payload.keywords {
        keywords::validate_selection(selection)?;
    }

    tracing::debug!("Creating task '{}'", payload.title);

    let task = Task::create_with_relations(
        state.pool(),
        &payload,
        Uuid::new_v4(),
        Some(session.user.id),
    )
    .await?;

    Ok((StatusCode::CREATED, ResponseJson(json!({ "data": task }))))
}

pub async fn update_task(
    Extension(existing_task): Extension<Task>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<Value>, ApiError> {
    if let Some(title) = &payload.title {
        validate_title(title)?;
    }
    validate_priority(payload.priority.as_deref().filter(|p| !p.is_empty()))?;
    if let Some(selection) = &payload.keywords {
        keywords::validate_selection(selection)?;
    }

    let task = Task::update_with_relations(state.pool(), &existing_task, &payload).await?;
    Ok(ResponseJson(json!({ "data": task })))
}

pub async fn toggle_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<Value>, ApiError> {
    let task = Task::toggle_done(state.pool(), task.id).await?;
    Ok(ResponseJson(json!({ "data": task })))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<Value>, ApiError> {
    Task::soft_delete(state.pool(), task.id).await?;
    Ok(ResponseJson(json!({ "message": "Task deleted successfully." })))
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::Validation(
            "The title field is required.".to_string(),
        ));
    }
    if title.chars().count() > TITLE_MAX {
        return Err(ApiError::Validation(format!(
            "The title may not be greater than {TITLE_MAX} characters."
        )));
    }
    Ok(())
}

fn validate_priority(priority: Option<&str>) -> Result<(), ApiError> {
    if let Some(priority) = priority {
        if priority.chars().count() > PRIORITY_MAX {
            return Err(ApiError::Validation(format!(
                "The priority may not be greater than {PRIORITY_MAX} characters."
            )));
        }
    }
    Ok(())
}

pub fn router(state: &AppState) -> Router<AppState> {
    let task_id_router = Router::new()
        .route(
            "/",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/toggle", patch(toggle_task))
        .route(
            "/keywords",
            axum::routing::post(keywords::attach_to_task).patch(keywords::sync_for_task),
        )
        .layer(from_fn_with_state(state.clone(), load_task_middleware));

    let inner = Router::new()
        .route("/", get(list_tasks).post(create_task))
        .nest("/{task_id}", task_id_router)
        .route(
            "/{task_id}/keywords/{keyword_id}",
            axum::routing::delete(keywords::detach_from_task),
        );

    Router::new().nest("/tasks", inner)
}
