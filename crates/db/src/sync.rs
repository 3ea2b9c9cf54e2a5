//! Reconciliation of many-to-many link rows between a task and its
//! keywords or assignees.
//!
//! All link rows are created and removed here, never directly by the
//! endpoint handlers. Every reconciliation runs inside one transaction:
//! name resolution, id validation, the link diff and its application either
//! all commit or all roll back.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{keyword::Keyword, user::User},
    Tx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Additive: missing links are created, existing links are kept.
    Attach,
    /// Replacing: the final link set equals exactly the requested set.
    Sync,
}

/// Requested keyword membership, as ids, names to create-or-get, or both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordSelection {
    #[serde(default)]
    pub keyword_ids: Vec<Uuid>,
    #[serde(default)]
    pub names: Vec<String>,
}

impl KeywordSelection {
    pub fn is_empty(&self) -> bool {
        self.keyword_ids.is_empty() && self.names.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Keyword {0} not found")]
    KeywordNotFound(Uuid),
    #[error("User {0} not found")]
    UserNotFound(Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// One assignment link member: the user plus the link's own attribute.
#[derive(Debug, Clone, Serialize)]
pub struct TaskAssignee {
    #[serde(flatten)]
    pub user: User,
    pub assigned_at: DateTime<Utc>,
}

pub async fn reconcile_keywords(
    pool: &SqlitePool,
    task_id: Uuid,
    selection: &KeywordSelection,
    mode: SyncMode,
) -> Result<Vec<Keyword>, SyncError> {
    let mut tx = pool.begin().await?;
    let keywords = reconcile_keywords_tx(&mut tx, task_id, selection, mode).await?;
    tx.commit().await?;
    Ok(keywords)
}

/// Reconcile the task's keyword links against `selection`.
///
/// Names are resolved create-or-get first, then unioned with the requested
/// ids (first occurrence wins, duplicates collapse). Links already present
/// are left untouched so their timestamps survive a re-sync.
pub async fn reconcile_keywords_tx(
    tx: &mut Tx<'_>,
    task_id: Uuid,
    selection: &KeywordSelection,
    mode: SyncMode,
) -> Result<Vec<Keyword>, SyncError> {
    let mut requested = Vec::new();
    let mut seen = HashSet::new();

    for &keyword_id in &selection.keyword_ids {
        if !Keyword::exists_tx(tx, keyword_id).await? {
            return Err(SyncError::KeywordNotFound(keyword_id));
        }
        if seen.insert(keyword_id) {
            requested.push(keyword_id);
        }
    }

    for name in &selection.names {
        let keyword = Keyword::find_or_create_tx(tx, name).await?;
        if seen.insert(keyword.id) {
            requested.push(keyword.id);
        }
    }

    let existing = sqlx::query_scalar::<_, Uuid>(
        "SELECT keyword_id FROM task_keywords WHERE task_id = $1",
    )
    .bind(task_id)
    .fetch_all(&mut **tx)
    .await?;
    let existing_set: HashSet<Uuid> = existing.iter().copied().collect();

    for &keyword_id in requested.iter().filter(|id| !existing_set.contains(*id)) {
        sqlx::query("INSERT INTO task_keywords (task_id, keyword_id) VALUES ($1, $2)")
            .bind(task_id)
            .bind(keyword_id)
            .execute(&mut **tx)
            .await?;
    }

    if mode == SyncMode::Sync {
        for &keyword_id in existing.iter().filter(|id| !seen.contains(*id)) {
            sqlx::query("DELETE FROM task_keywords WHERE task_id = $1 AND keyword_id = $2")
                .bind(task_id)
                .bind(keyword_id)
                .execute(&mut **tx)
                .await?;
        }
    }

    keywords_for_task_tx(tx, task_id).await.map_err(SyncError::from)
}

pub async fn reconcile_assignees(
    pool: &SqlitePool,
    task_id: Uuid,
    user_ids: &[Uuid],
    mode: SyncMode,
) -> Result<Vec<TaskAssignee>, SyncError> {
    let mut tx = pool.begin().await?;
    let assignees = reconcile_assignees_tx(&mut tx, task_id, user_ids, mode).await?;
    tx.commit().await?;
    Ok(assignees)
}

/// Same reconciliation as keywords, but members are referenced by id only
/// and the link row carries its own `assigned_at` attribute, which is
/// preserved for links that survive a re-sync.
pub async fn reconcile_assignees_tx(
    tx: &mut Tx<'_>,
    task_id: Uuid,
    user_ids: &[Uuid],
    mode: SyncMode,
) -> Result<Vec<TaskAssignee>, SyncError> {
    let mut requested = Vec::new();
    let mut seen = HashSet::new();

    for &user_id in user_ids {
        if !User::exists_tx(tx, user_id).await? {
            return Err(SyncError::UserNotFound(user_id));
        }
        if seen.insert(user_id) {
            requested.push(user_id);
        }
    }

    let existing = sqlx::query_scalar::<_, Uuid>(
        "SELECT user_id FROM task_assignees WHERE task_id = $1",
    )
    .bind(task_id)
    .fetch_all(&mut **tx)
    .await?;
    let existing_set: HashSet<Uuid> = existing.iter().copied().collect();

    for &user_id in requested.iter().filter(|id| !existing_set.contains(*id)) {
        sqlx::query("INSERT INTO task_assignees (task_id, user_id) VALUES ($1, $2)")
            .bind(task_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
    }

    if mode == SyncMode::Sync {
        for &user_id in existing.iter().filter(|id| !seen.contains(*id)) {
            sqlx::query("DELETE FROM task_assignees WHERE task_id = $1 AND user_id = $2")
                .bind(task_id)
                .bind(user_id)
                .execute(&mut **tx)
                .await?;
        }
    }

    assignees_for_task_tx(tx, task_id).await.map_err(SyncError::from)
}

/// Remove a single task↔keyword link. Idempotent: a missing link is not an
/// error, the call just reports whether anything was removed.
pub async fn detach_keyword(
    pool: &SqlitePool,
    task_id: Uuid,
    keyword_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM task_keywords WHERE task_id = $1 AND keyword_id = $2")
        .bind(task_id)
        .bind(keyword_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn keywords_for_task(
    pool: &SqlitePool,
    task_id: Uuid,
) -> Result<Vec<Keyword>, sqlx::Error> {
    sqlx::query_as::<_, Keyword>(KEYWORDS_FOR_TASK)
        .bind(task_id)
        .fetch_all(pool)
        .await
}

async fn keywords_for_task_tx(tx: &mut Tx<'_>, task_id: Uuid) -> Result<Vec<Keyword>, sqlx::Error> {
    sqlx::query_as::<_, Keyword>(KEYWORDS_FOR_TASK)
        .bind(task_id)
        .fetch_all(&mut **tx)
        .await
}

pub async fn assignees_for_task(
    pool: &SqlitePool,
    task_id: Uuid,
) -> Result<Vec<TaskAssignee>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AssigneeRow>(ASSIGNEES_FOR_TASK)
        .bind(task_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(AssigneeRow::into_assignee).collect())
}

async fn assignees_for_task_tx(
    tx: &mut Tx<'_>,
    task_id: Uuid,
) -> Result<Vec<TaskAssignee>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AssigneeRow>(ASSIGNEES_FOR_TASK)
        .bind(task_id)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().map(AssigneeRow::into_assignee).collect())
}

// Link-insertion order; no other ordering is promised.
const KEYWORDS_FOR_TASK: &str = r#"
    SELECT k.id, k.name, k.created_at, k.updated_at
    FROM keywords k
    JOIN task_keywords tk ON tk.keyword_id = k.id
    WHERE tk.task_id = $1
    ORDER BY tk.rowid
"#;

const ASSIGNEES_FOR_TASK: &str = r#"
    SELECT u.id, u.name, u.email, u.password_hash, u.created_at, u.updated_at,
           ta.assigned_at
    FROM users u
    JOIN task_assignees ta ON ta.user_id = u.id
    WHERE ta.task_id = $1
    ORDER BY ta.rowid
"#;

#[derive(FromRow)]
struct AssigneeRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    assigned_at: DateTime<Utc>,
}

impl AssigneeRow {
    fn into_assignee(self) -> TaskAssignee {
        TaskAssignee {
            user: User {
                id: self.id,
                name: self.name,
                email: self.email,
                password_hash: self.password_hash,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            assigned_at: self.assigned_at,
        }
    }
}
