use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// A duplicate email, including one inserted concurrently, is a conflict.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .map_err(|e| email_conflict(e, "insert user", "Email already registered."))?;
        Ok(user)
    }

    /// Writes email and password hash together; callers pass the current
    /// values for anything that did not change.
    pub async fn update_credentials(
        db: &PgPool,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3
             WHERE id = $1
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .map_err(|e| {
            email_conflict(e, "update user credentials", "Email address is already in use.")
        })?;
        Ok(user)
    }
}

fn email_conflict(err: sqlx::Error, action: &'static str, message: &str) -> ApiError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::conflict(message),
        other => ApiError::Internal(anyhow::Error::new(other).context(action)),
    }
}
