use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::Tx;

#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("Keyword not found")]
    NotFound,
    #[error("keyword name already exists")]
    NameExists,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for KeywordError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::NameExists,
            _ => Self::Database(error),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Keyword {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyword {
    pub name: String,
}

impl Keyword {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Keyword>(
            r#"SELECT id, name, created_at, updated_at
               FROM keywords
               ORDER BY created_at DESC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Keyword>(
            r#"SELECT id, name, created_at, updated_at
               FROM keywords
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateKeyword,
        keyword_id: Uuid,
    ) -> Result<Self, KeywordError> {
        let keyword = sqlx::query_as::<_, Keyword>(
            r#"INSERT INTO keywords (id, name)
               VALUES ($1, $2)
               RETURNING id, name, created_at, updated_at"#,
        )
        .bind(keyword_id)
        .bind(&data.name)
        .fetch_one(pool)
        .await?;

        Ok(keyword)
    }

    pub async fn update_name(
        pool: &SqlitePool,
        id: Uuid,
        name: &str,
    ) -> Result<Self, KeywordError> {
        let keyword = sqlx::query_as::<_, Keyword>(
            r#"UPDATE keywords
               SET name = $2,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, created_at, updated_at"#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or(KeywordError::NotFound)?;

        Ok(keyword)
    }

    /// Hard delete. Link rows go with it via FK cascade.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM keywords WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Create-or-get by exact name. A concurrent insert of the same name is
    /// absorbed by `ON CONFLICT DO NOTHING` followed by a re-fetch, so the
    /// unique constraint never surfaces to the caller.
    pub async fn find_or_create_tx(tx: &mut Tx<'_>, name: &str) -> Result<Self, sqlx::Error> {
        let inserted = sqlx::query_as::<_, Keyword>(
            r#"INSERT INTO keywords (id, name)
               VALUES ($1, $2)
               ON CONFLICT(name) DO NOTHING
               RETURNING id, name, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(keyword) = inserted {
            return Ok(keyword);
        }

        sqlx::query_as::<_, Keyword>(
            r#"SELECT id, name, created_at, updated_at
               FROM keywords
               WHERE name = $1"#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn exists_tx(tx: &mut Tx<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM keywords WHERE id = $1")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(count > 0)
    }
}
