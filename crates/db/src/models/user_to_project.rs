use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("User is already assigned to this project")]
    AlreadyAssigned,
    #[error("User is not assigned to this project")]
    NotAssigned,
    #[error("A project must keep at least one coach")]
    LastCoach,
    #[error("Project not found")]
    ProjectNotFound,
}

/// Role of an identity on a project. Stored as `coach` / `default`; the
/// standard role is surfaced as `member` and accepted under either name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS)]
#[sqlx(type_name = "project_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Coach,
    #[sqlx(rename = "default")]
    #[serde(alias = "default")]
    Member,
}

impl ProjectRole {
    pub fn is_coach(self) -> bool {
        matches!(self, ProjectRole::Coach)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UserToProject {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: Uuid,
    pub role: ProjectRole,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AssignUser {
    pub user_id: String,
    pub role: ProjectRole,
}

impl UserToProject {
    pub async fn find(
        pool: &SqlitePool,
        user_id: &str,
        project_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserToProject>(
            r#"SELECT id, user_id, project_id, role, created_at
               FROM user_to_project
               WHERE user_id = ? AND project_id = ?"#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }

    /// The viewer's role on the project. No assignment is `Ok(None)`.
    pub async fn resolve_role(
        pool: &SqlitePool,
        user_id: &str,
        project_id: Uuid,
    ) -> Result<Option<ProjectRole>, sqlx::Error> {
        sqlx::query_scalar::<_, ProjectRole>(
            "SELECT role FROM user_to_project WHERE user_id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn has_access(
        pool: &SqlitePool,
        user_id: &str,
        project_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::resolve_role(pool, user_id, project_id)
            .await?
            .is_some())
    }

    pub async fn is_coach(
        pool: &SqlitePool,
        user_id: &str,
        project_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::resolve_role(pool, user_id, project_id)
            .await?
            .is_some_and(ProjectRole::is_coach))
    }

    pub async fn find_by_project(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserToProject>(
            r#"SELECT id, user_id, project_id, role, created_at
               FROM user_to_project
               WHERE project_id = ?
               ORDER BY created_at ASC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_project_and_role(
        pool: &SqlitePool,
        project_id: Uuid,
        role: ProjectRole,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserToProject>(
            r#"SELECT id, user_id, project_id, role, created_at
               FROM user_to_project
               WHERE project_id = ? AND role = ?
               ORDER BY created_at ASC"#,
        )
        .bind(project_id)
        .bind(role)
        .fetch_all(pool)
        .await
    }

    /// Inserts the assignment. The unique (user, project) index makes a
    /// concurrent duplicate lose cleanly with `AlreadyAssigned`.
    pub async fn assign(
        pool: &SqlitePool,
        project_id: Uuid,
        data: &AssignUser,
    ) -> Result<Self, MembershipError> {
        let inserted = sqlx::query_as::<_, UserToProject>(
            r#"INSERT INTO user_to_project (id, user_id, project_id, role)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (user_id, project_id) DO NOTHING
               RETURNING id, user_id, project_id, role, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.user_id)
        .bind(project_id)
        .bind(data.role)
        .fetch_optional(pool)
        .await
        .map_err(map_foreign_key)?;

        inserted.ok_or(MembershipError::AlreadyAssigned)
    }

    pub async fn update_role(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Self, MembershipError> {
        let mut tx = pool.begin().await?;

        // Demoting the only coach matches no row.
        let updated = sqlx::query_as::<_, UserToProject>(
            r#"UPDATE user_to_project
               SET role = ?1
               WHERE user_id = ?2
                 AND project_id = ?3
                 AND NOT (
                     role = 'coach'
                     AND ?1 <> 'coach'
                     AND (SELECT COUNT(*) FROM user_to_project
                          WHERE project_id = ?3 AND role = 'coach') <= 1
                 )
               RETURNING id, user_id, project_id, role, created_at"#,
        )
        .bind(role)
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match updated {
            Some(assignment) => assignment,
            None => {
                let exists = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM user_to_project WHERE user_id = ? AND project_id = ?",
                )
                .bind(user_id)
                .bind(project_id)
                .fetch_one(&mut *tx)
                .await?;
                return Err(if exists > 0 {
                    MembershipError::LastCoach
                } else {
                    MembershipError::NotAssigned
                });
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    pub async fn remove(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: &str,
    ) -> Result<(), MembershipError> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            r#"DELETE FROM user_to_project
               WHERE user_id = ?1
                 AND project_id = ?2
                 AND NOT (
                     role = 'coach'
                     AND (SELECT COUNT(*) FROM user_to_project
                          WHERE project_id = ?2 AND role = 'coach') <= 1
                 )"#,
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM user_to_project WHERE user_id = ? AND project_id = ?",
            )
            .bind(user_id)
            .bind(project_id)
            .fetch_one(&mut *tx)
            .await?;
            return Err(if exists > 0 {
                MembershipError::LastCoach
            } else {
                MembershipError::NotAssigned
            });
        }

        tx.commit().await?;
        Ok(())
    }
}

fn map_foreign_key(error: sqlx::Error) -> MembershipError {
    match &error {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            MembershipError::ProjectNotFound
        }
        _ => MembershipError::Database(error),
    }
}
