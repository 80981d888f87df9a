use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    UserNotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub token_identifier: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub profile_picture_url: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// Profile fields reported by the client after sign-in.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SyncUser {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

impl User {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, token_identifier, first_name, last_name, email, profile_picture_url,
                      created_at, updated_at
               FROM users
               ORDER BY created_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_token_identifier(
        pool: &SqlitePool,
        token_identifier: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, token_identifier, first_name, last_name, email, profile_picture_url,
                      created_at, updated_at
               FROM users
               WHERE token_identifier = ?"#,
        )
        .bind(token_identifier)
        .fetch_optional(pool)
        .await
    }

    /// Looks up several identities at once. Unknown identifiers are skipped;
    /// the result follows the order of `token_identifiers`.
    pub async fn find_by_token_identifiers(
        pool: &SqlitePool,
        token_identifiers: &[String],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if token_identifiers.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"SELECT id, token_identifier, first_name, last_name, email, profile_picture_url,
                      created_at, updated_at
               FROM users
               WHERE token_identifier IN ("#,
        );
        let mut separated = builder.separated(", ");
        for token_identifier in token_identifiers {
            separated.push_bind(token_identifier);
        }
        separated.push_unseparated(")");

        let mut by_token: HashMap<String, User> = builder
            .build_query_as::<User>()
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|user| (user.token_identifier.clone(), user))
            .collect();

        Ok(token_identifiers
            .iter()
            .filter_map(|token_identifier| by_token.remove(token_identifier))
            .collect())
    }

    /// Creates or refreshes the profile of the authenticated identity.
    pub async fn sync(
        pool: &SqlitePool,
        token_identifier: &str,
        data: &SyncUser,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, token_identifier, first_name, last_name, email, profile_picture_url)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (token_identifier) DO UPDATE SET
                   first_name          = excluded.first_name,
                   last_name           = excluded.last_name,
                   email               = excluded.email,
                   profile_picture_url = excluded.profile_picture_url,
                   updated_at          = datetime('now', 'subsec')
               RETURNING id, token_identifier, first_name, last_name, email, profile_picture_url,
                         created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(token_identifier)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.profile_picture_url)
        .fetch_one(pool)
        .await
    }
}
