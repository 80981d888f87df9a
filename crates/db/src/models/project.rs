use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::user_to_project::ProjectRole;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Project name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub graph_version: i64,

    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// A project as seen by one viewer, together with the viewer's role on it.
#[derive(Debug, Clone, FromRow, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithRole {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub role: ProjectRole,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateProject {
    pub name: String,
    pub description: String,
}

impl Project {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"SELECT id, name, description, graph_version, created_at, updated_at
               FROM projects
               WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Projects the given identity is assigned to, most recently updated first.
    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> Result<Vec<ProjectWithRole>, sqlx::Error> {
        sqlx::query_as::<_, ProjectWithRole>(
            r#"SELECT p.id, p.name, p.description, p.graph_version, p.created_at, p.updated_at,
                      utp.role
               FROM projects p
               INNER JOIN user_to_project utp ON utp.project_id = p.id
               WHERE utp.user_id = ?
               ORDER BY p.updated_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Creates the project and makes `creator_user_id` its first coach.
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateProject,
        creator_user_id: &str,
    ) -> Result<Self, ProjectError> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(ProjectError::EmptyName);
        }
        let description = data
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();

        let mut tx = pool.begin().await?;

        let project = sqlx::query_as::<_, Project>(
            r#"INSERT INTO projects (id, name, description)
               VALUES (?, ?, ?)
               RETURNING id, name, description, graph_version, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO user_to_project (id, user_id, project_id, role)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(Uuid::new_v4())
        .bind(creator_user_id)
        .bind(project.id)
        .bind(ProjectRole::Coach)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(ProjectError::EmptyName);
        }

        sqlx::query_as::<_, Project>(
            r#"UPDATE projects
               SET name = ?, description = ?, updated_at = datetime('now', 'subsec')
               WHERE id = ?
               RETURNING id, name, description, graph_version, created_at, updated_at"#,
        )
        .bind(name)
        .bind(data.description.trim())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ProjectError::ProjectNotFound)
    }

    /// Deletes the project; tasks, edges and role assignments cascade.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Advances the graph version inside the caller's transaction and returns
    /// the new value, or `None` when the project does not exist.
    pub(crate) async fn bump_graph_version(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"UPDATE projects
               SET graph_version = graph_version + 1,
                   updated_at    = datetime('now', 'subsec')
               WHERE id = ?
               RETURNING graph_version"#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }
}
