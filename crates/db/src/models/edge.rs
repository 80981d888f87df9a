use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{graph::GraphError, project::Project};

pub const DEFAULT_EDGE_TYPE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub stroke_width: Option<f64>,
}

impl EdgeStyle {
    fn from_columns(stroke: Option<String>, stroke_width: Option<f64>) -> Option<Self> {
        if stroke.is_none() && stroke_width.is_none() {
            None
        } else {
            Some(EdgeStyle {
                stroke,
                stroke_width,
            })
        }
    }
}

/// Edge record in the shape the flow canvas consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub style: Option<EdgeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub animated: Option<bool>,
}

fn default_edge_type() -> String {
    DEFAULT_EDGE_TYPE.to_string()
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub project_id: Uuid,
    pub source_task_id: Uuid,
    pub target_task_id: Uuid,
    pub edge_type: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub label: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub animated: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateEdge {
    pub source: Uuid,
    pub target: Uuid,
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub animated: Option<bool>,
}

/// Columns of a new edge row once its endpoints are resolved to task ids.
#[derive(Debug, Clone)]
pub(crate) struct EdgeRow<'a> {
    pub source: Uuid,
    pub target: Uuid,
    pub edge_type: &'a str,
    pub source_handle: Option<&'a str>,
    pub target_handle: Option<&'a str>,
    pub label: Option<&'a str>,
    pub style: Option<&'a EdgeStyle>,
    pub animated: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateEdgeLabel {
    pub label: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateEdgeAnimation {
    pub animated: bool,
}

impl From<Edge> for FlowEdge {
    fn from(edge: Edge) -> Self {
        FlowEdge {
            id: edge.id.to_string(),
            source: edge.source_task_id.to_string(),
            target: edge.target_task_id.to_string(),
            edge_type: edge.edge_type,
            source_handle: edge.source_handle,
            target_handle: edge.target_handle,
            label: edge.label,
            style: EdgeStyle::from_columns(edge.stroke, edge.stroke_width),
            animated: edge.animated,
        }
    }
}

impl Edge {
    /// All edges of a project in insertion order.
    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Edge>(
            r#"SELECT id, project_id, source_task_id, target_task_id, edge_type, source_handle,
                      target_handle, label, stroke, stroke_width, animated, created_at, updated_at
               FROM edges
               WHERE project_id = ?
               ORDER BY rowid ASC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        data: &CreateEdge,
    ) -> Result<Self, GraphError> {
        let mut tx = pool.begin().await?;
        Project::bump_graph_version(&mut tx, project_id)
            .await?
            .ok_or(GraphError::ProjectNotFound)?;

        // Both endpoints must be tasks of this project at creation time.
        let endpoints = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE project_id = ? AND id IN (?, ?)",
        )
        .bind(project_id)
        .bind(data.source)
        .bind(data.target)
        .fetch_one(&mut *tx)
        .await?;
        let expected = if data.source == data.target { 1 } else { 2 };
        if endpoints != expected {
            return Err(GraphError::TaskNotFound);
        }

        let edge = Self::insert(
            &mut tx,
            Uuid::new_v4(),
            project_id,
            EdgeRow {
                source: data.source,
                target: data.target,
                edge_type: &data.edge_type,
                source_handle: data.source_handle.as_deref(),
                target_handle: data.target_handle.as_deref(),
                label: data.label.as_deref(),
                style: None,
                animated: data.animated,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(edge)
    }

    pub(crate) async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        project_id: Uuid,
        row: EdgeRow<'_>,
    ) -> Result<Self, sqlx::Error> {
        let (stroke, stroke_width) = match row.style {
            Some(style) => (style.stroke.as_deref(), style.stroke_width),
            None => (None, None),
        };

        sqlx::query_as::<_, Edge>(
            r#"INSERT INTO edges (id, project_id, source_task_id, target_task_id, edge_type,
                                  source_handle, target_handle, label, stroke, stroke_width, animated)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id, project_id, source_task_id, target_task_id, edge_type, source_handle,
                         target_handle, label, stroke, stroke_width, animated, created_at, updated_at"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(row.source)
        .bind(row.target)
        .bind(row.edge_type)
        .bind(row.source_handle)
        .bind(row.target_handle)
        .bind(row.label)
        .bind(stroke)
        .bind(stroke_width)
        .bind(row.animated)
        .fetch_one(conn)
        .await
    }

    pub async fn update_style(
        pool: &SqlitePool,
        project_id: Uuid,
        id: Uuid,
        style: &EdgeStyle,
    ) -> Result<Self, GraphError> {
        let mut tx = pool.begin().await?;
        let edge = sqlx::query_as::<_, Edge>(
            r#"UPDATE edges
               SET stroke = ?, stroke_width = ?, updated_at = datetime('now', 'subsec')
               WHERE id = ? AND project_id = ?
               RETURNING id, project_id, source_task_id, target_task_id, edge_type, source_handle,
                         target_handle, label, stroke, stroke_width, animated, created_at, updated_at"#,
        )
        .bind(&style.stroke)
        .bind(style.stroke_width)
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GraphError::EdgeNotFound)?;
        Project::bump_graph_version(&mut tx, project_id).await?;
        tx.commit().await?;
        Ok(edge)
    }

    pub async fn update_label(
        pool: &SqlitePool,
        project_id: Uuid,
        id: Uuid,
        label: &str,
    ) -> Result<Self, GraphError> {
        let mut tx = pool.begin().await?;
        let edge = sqlx::query_as::<_, Edge>(
            r#"UPDATE edges
               SET label = ?, updated_at = datetime('now', 'subsec')
               WHERE id = ? AND project_id = ?
               RETURNING id, project_id, source_task_id, target_task_id, edge_type, source_handle,
                         target_handle, label, stroke, stroke_width, animated, created_at, updated_at"#,
        )
        .bind(label)
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GraphError::EdgeNotFound)?;
        Project::bump_graph_version(&mut tx, project_id).await?;
        tx.commit().await?;
        Ok(edge)
    }

    pub async fn set_animated(
        pool: &SqlitePool,
        project_id: Uuid,
        id: Uuid,
        animated: bool,
    ) -> Result<Self, GraphError> {
        let mut tx = pool.begin().await?;
        let edge = sqlx::query_as::<_, Edge>(
            r#"UPDATE edges
               SET animated = ?, updated_at = datetime('now', 'subsec')
               WHERE id = ? AND project_id = ?
               RETURNING id, project_id, source_task_id, target_task_id, edge_type, source_handle,
                         target_handle, label, stroke, stroke_width, animated, created_at, updated_at"#,
        )
        .bind(animated)
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GraphError::EdgeNotFound)?;
        Project::bump_graph_version(&mut tx, project_id).await?;
        tx.commit().await?;
        Ok(edge)
    }

    pub async fn delete(pool: &SqlitePool, project_id: Uuid, id: Uuid) -> Result<(), GraphError> {
        let mut tx = pool.begin().await?;
        let result = sqlx::query("DELETE FROM edges WHERE id = ? AND project_id = ?")
            .bind(id)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GraphError::EdgeNotFound);
        }
        Project::bump_graph_version(&mut tx, project_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes every edge running from `source` to `target` (direction
    /// matters) in one statement. Returns how many were removed.
    pub async fn delete_between(
        pool: &SqlitePool,
        project_id: Uuid,
        source: Uuid,
        target: Uuid,
    ) -> Result<u64, GraphError> {
        let mut tx = pool.begin().await?;
        let removed = sqlx::query(
            r#"DELETE FROM edges
               WHERE source_task_id = ? AND target_task_id = ? AND project_id = ?"#,
        )
        .bind(source)
        .bind(target)
        .bind(project_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if removed > 0 {
            Project::bump_graph_version(&mut tx, project_id).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }
}
