use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::user::User;

/// Opaque bearer credential issued per login. Only the sha256 digest of the
/// token is stored; the plaintext is returned to the client exactly once.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller: the user plus the specific token that
/// authenticated the request, so logout can revoke exactly that token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token_id: Uuid,
}

impl ApiToken {
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        name: &str,
        token_hash: &str,
        token_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ApiToken>(
            r#"INSERT INTO api_tokens (id, user_id, name, token_hash)
               VALUES ($1, $2, $3, $4)
               RETURNING id, user_id, name, token_hash, created_at"#,
        )
        .bind(token_id)
        .bind(user_id)
        .bind(name)
        .bind(token_hash)
        .fetch_one(pool)
        .await
    }

    /// Resolve a token digest to its owning user. `None` means the token is
    /// unknown or already revoked.
    pub async fn find_session_by_digest(
        pool: &SqlitePool,
        token_hash: &str,
    ) -> Result<Option<AuthSession>, sqlx::Error> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"SELECT t.id AS token_id,
                      u.id, u.name, u.email, u.password_hash, u.created_at, u.updated_at
               FROM api_tokens t
               JOIN users u ON u.id = t.user_id
               WHERE t.token_hash = $1"#,
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(SessionRow::into_session))
    }

    /// Delete one token. Returns whether a row was actually removed.
    pub async fn revoke(pool: &SqlitePool, token_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = $1")
            .bind(token_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(FromRow)]
struct SessionRow {
    token_id: Uuid,
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> AuthSession {
        AuthSession {
            token_id: self.token_id,
            user: User {
                id: self.id,
                name: self.name,
                email: self.email,
                password_hash: self.password_hash,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        }
    }
}
