use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{graph::GraphError, project::Project};

pub const DEFAULT_NODE_TYPE: &str = "task";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS,
)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Blocked,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Payload rendered inside a task node on the canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskData {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub assigned_to: Option<String>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub priority: TaskPriority,
}

/// Node record in the shape the flow canvas consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: TaskData,
}

fn default_node_type() -> String {
    DEFAULT_NODE_TYPE.to_string()
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub node_type: String,
    pub position_x: f64,
    pub position_y: f64,
    pub label: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub assigned_to: Option<String>,
    pub due_date: Option<i64>,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTask {
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: TaskData,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateTaskPosition {
    pub position: Position,
}

impl From<Task> for FlowNode {
    fn from(task: Task) -> Self {
        FlowNode {
            id: task.id.to_string(),
            node_type: task.node_type,
            position: Position {
                x: task.position_x,
                y: task.position_y,
            },
            data: TaskData {
                label: task.label,
                description: task.description,
                status: task.status,
                assigned_to: task.assigned_to,
                due_date: task.due_date,
                priority: task.priority,
            },
        }
    }
}

impl Task {
    /// All tasks of a project in insertion order.
    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, project_id, node_type, position_x, position_y, label, description,
                      status, assigned_to, due_date, priority, created_at, updated_at
               FROM tasks
               WHERE project_id = ?
               ORDER BY rowid ASC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, project_id, node_type, position_x, position_y, label, description,
                      status, assigned_to, due_date, priority, created_at, updated_at
               FROM tasks
               WHERE id = ? AND project_id = ?"#,
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        data: &CreateTask,
    ) -> Result<Self, GraphError> {
        let mut tx = pool.begin().await?;
        Project::bump_graph_version(&mut tx, project_id)
            .await?
            .ok_or(GraphError::ProjectNotFound)?;
        let task = Self::insert(
            &mut tx,
            Uuid::new_v4(),
            project_id,
            &data.node_type,
            data.position,
            &data.data,
        )
        .await?;
        tx.commit().await?;
        Ok(task)
    }

    pub(crate) async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        project_id: Uuid,
        node_type: &str,
        position: Position,
        data: &TaskData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, project_id, node_type, position_x, position_y, label,
                                  description, status, assigned_to, due_date, priority)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id, project_id, node_type, position_x, position_y, label, description,
                         status, assigned_to, due_date, priority, created_at, updated_at"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(node_type)
        .bind(position.x)
        .bind(position.y)
        .bind(&data.label)
        .bind(&data.description)
        .bind(data.status)
        .bind(&data.assigned_to)
        .bind(data.due_date)
        .bind(data.priority)
        .fetch_one(conn)
        .await
    }

    pub async fn update_position(
        pool: &SqlitePool,
        project_id: Uuid,
        id: Uuid,
        position: Position,
    ) -> Result<Self, GraphError> {
        let mut tx = pool.begin().await?;
        let task = sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET position_x = ?, position_y = ?, updated_at = datetime('now', 'subsec')
               WHERE id = ? AND project_id = ?
               RETURNING id, project_id, node_type, position_x, position_y, label, description,
                         status, assigned_to, due_date, priority, created_at, updated_at"#,
        )
        .bind(position.x)
        .bind(position.y)
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GraphError::TaskNotFound)?;
        Project::bump_graph_version(&mut tx, project_id).await?;
        tx.commit().await?;
        Ok(task)
    }

    /// Replaces the node payload (label, status, assignment...) wholesale.
    pub async fn update_data(
        pool: &SqlitePool,
        project_id: Uuid,
        id: Uuid,
        data: &TaskData,
    ) -> Result<Self, GraphError> {
        let mut tx = pool.begin().await?;
        let task = sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET label       = ?,
                   description = ?,
                   status      = ?,
                   assigned_to = ?,
                   due_date    = ?,
                   priority    = ?,
                   updated_at  = datetime('now', 'subsec')
               WHERE id = ? AND project_id = ?
               RETURNING id, project_id, node_type, position_x, position_y, label, description,
                         status, assigned_to, due_date, priority, created_at, updated_at"#,
        )
        .bind(&data.label)
        .bind(&data.description)
        .bind(data.status)
        .bind(&data.assigned_to)
        .bind(data.due_date)
        .bind(data.priority)
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GraphError::TaskNotFound)?;
        Project::bump_graph_version(&mut tx, project_id).await?;
        tx.commit().await?;
        Ok(task)
    }

    /// Deletes the task only. Edges naming it as source or target stay.
    pub async fn delete(pool: &SqlitePool, project_id: Uuid, id: Uuid) -> Result<(), GraphError> {
        let mut tx = pool.begin().await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND project_id = ?")
            .bind(id)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GraphError::TaskNotFound);
        }
        Project::bump_graph_version(&mut tx, project_id).await?;
        tx.commit().await?;
        Ok(())
    }
}
