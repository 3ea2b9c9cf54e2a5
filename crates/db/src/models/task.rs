use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use super::{boolish, keyword::Keyword, user::User};
use crate::sync::{self, KeywordSelection, SyncError, SyncMode, TaskAssignee};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,
    #[error("User {0} not found")]
    CreatorNotFound(Uuid),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for TaskError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound,
            _ => Self::Database(error),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_done: bool,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub creator_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "boolish::deserialize_opt")]
    pub is_done: Option<bool>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub creator_id: Option<Uuid>,
    pub assignees: Option<Vec<Uuid>>,
    pub keywords: Option<KeywordSelection>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "boolish::deserialize_opt")]
    pub is_done: Option<bool>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub assignees: Option<Vec<Uuid>>,
    pub keywords: Option<KeywordSelection>,
}

/// A task serialized the way the API returns it from single-task
/// endpoints: relation members inline next to the task's own columns.
#[derive(Debug, Serialize)]
pub struct TaskWithRelations {
    #[serde(flatten)]
    pub task: Task,
    pub creator: Option<User>,
    pub assignees: Vec<TaskAssignee>,
    pub keywords: Vec<Keyword>,
}

const TASK_COLUMNS: &str = "id, title, description, is_done, due_date, priority, \
                            creator_id, deleted_at, created_at, updated_at";

impl Task {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE deleted_at IS NULL ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Soft-deleted tasks are treated as absent.
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn with_relations(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<TaskWithRelations>, sqlx::Error> {
        let Some(task) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let creator = match task.creator_id {
            Some(creator_id) => User::find_by_id(pool, creator_id).await?,
            None => None,
        };
        let assignees = sync::assignees_for_task(pool, task.id).await?;
        let keywords = sync::keywords_for_task(pool, task.id).await?;

        Ok(Some(TaskWithRelations {
            task,
            creator,
            assignees,
            keywords,
        }))
    }

    /// Insert the task and reconcile any relation payloads, all in one
    /// transaction. Relations use `Sync` mode: on a fresh task there is
    /// nothing to preserve.
    pub async fn create_with_relations(
        pool: &SqlitePool,
        data: &CreateTask,
        task_id: Uuid,
        fallback_creator: Option<Uuid>,
    ) -> Result<TaskWithRelations, TaskError> {
        let creator_id = data.creator_id.or(fallback_creator);

        let mut tx = pool.begin().await.map_err(TaskError::from)?;

        if let Some(creator) = creator_id {
            if !User::exists_tx(&mut tx, creator)
                .await
                .map_err(TaskError::from)?
            {
                return Err(TaskError::CreatorNotFound(creator));
            }
        }

        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, title, description, is_done, due_date, priority, creator_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.is_done.unwrap_or(false))
        .bind(data.due_date)
        .bind(&data.priority)
        .bind(creator_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(TaskError::from)?;

        if let Some(assignees) = &data.assignees {
            sync::reconcile_assignees_tx(&mut tx, task.id, assignees, SyncMode::Sync).await?;
        }
        if let Some(keywords) = &data.keywords {
            sync::reconcile_keywords_tx(&mut tx, task.id, keywords, SyncMode::Sync).await?;
        }

        tx.commit().await.map_err(TaskError::from)?;

        Self::with_relations(pool, task.id)
            .await
            .map_err(TaskError::from)?
            .ok_or(TaskError::NotFound)
    }

    /// Partial update: omitted fields keep their value, an empty string
    /// clears description/priority, relation payloads replace the link set.
    pub async fn update_with_relations(
        pool: &SqlitePool,
        existing: &Task,
        data: &UpdateTask,
    ) -> Result<TaskWithRelations, TaskError> {
        let title = data.title.clone().unwrap_or_else(|| existing.title.clone());
        let description = merge_clearable(&data.description, &existing.description);
        let priority = merge_clearable(&data.priority, &existing.priority);
        let is_done = data.is_done.unwrap_or(existing.is_done);
        let due_date = data.due_date.or(existing.due_date);

        let mut tx = pool.begin().await.map_err(TaskError::from)?;

        sqlx::query(
            "UPDATE tasks
             SET title = $2,
                 description = $3,
                 is_done = $4,
                 due_date = $5,
                 priority = $6,
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(existing.id)
        .bind(&title)
        .bind(&description)
        .bind(is_done)
        .bind(due_date)
        .bind(&priority)
        .execute(&mut *tx)
        .await
        .map_err(TaskError::from)?;

        if let Some(assignees) = &data.assignees {
            sync::reconcile_assignees_tx(&mut tx, existing.id, assignees, SyncMode::Sync).await?;
        }
        if let Some(keywords) = &data.keywords {
            sync::reconcile_keywords_tx(&mut tx, existing.id, keywords, SyncMode::Sync).await?;
        }

        tx.commit().await.map_err(TaskError::from)?;

        Self::with_relations(pool, existing.id)
            .await
            .map_err(TaskError::from)?
            .ok_or(TaskError::NotFound)
    }

    pub async fn toggle_done(pool: &SqlitePool, id: Uuid) -> Result<Self, TaskError> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks
             SET is_done = NOT is_done,
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(TaskError::from)?
        .ok_or(TaskError::NotFound)
    }

    /// Soft delete: the record stays, flagged with `deleted_at`. FK cascade
    /// only fires on hard deletes, so link rows are cleared here in the
    /// same transaction.
    pub async fn soft_delete(pool: &SqlitePool, id: Uuid) -> Result<(), TaskError> {
        let mut tx = pool.begin().await.map_err(TaskError::from)?;

        let result = sqlx::query(
            "UPDATE tasks
             SET deleted_at = datetime('now', 'subsec')
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(TaskError::from)?;

        if result.rows_affected() == 0 {
            return Err(TaskError::NotFound);
        }

        sqlx::query("DELETE FROM task_keywords WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(TaskError::from)?;
        sqlx::query("DELETE FROM task_assignees WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(TaskError::from)?;

        tx.commit().await.map_err(TaskError::from)?;
        Ok(())
    }
}

// Field omitted = keep existing, empty string = clear, otherwise replace.
fn merge_clearable(update: &Option<String>, existing: &Option<String>) -> Option<String> {
    match update {
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(s.clone()),
        None => existing.clone(),
    }
}
