use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    edge::{Edge, EdgeRow, FlowEdge},
    project::Project,
    task::{FlowNode, Task},
};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Task not found")]
    TaskNotFound,
    #[error("Edge not found")]
    EdgeNotFound,
    #[error("Graph was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict { expected: i64, actual: i64 },
    #[error("Node id `{0}` appears more than once in the snapshot")]
    DuplicateNodeId(String),
    #[error("Edge `{edge_id}` references unknown node `{node_id}`")]
    UnknownNodeReference { edge_id: String, node_id: String },
}

/// A project's whole task graph as the canvas renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGraph {
    pub project_id: Uuid,
    pub version: i64,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

/// Full replacement graph submitted by the editor on save. Node ids are the
/// client's ids and only serve to resolve edge endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub expected_version: Option<i64>,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl GraphSnapshot {
    /// Rejects snapshots whose edges could not be remapped onto the inserted
    /// tasks.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut node_ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNodeId(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(GraphError::UnknownNodeReference {
                        edge_id: edge.id.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl ProjectGraph {
    pub async fn load(pool: &SqlitePool, project_id: Uuid) -> Result<Self, GraphError> {
        // The version is read before the rows: a concurrent replace can only
        // leave it stale, never ahead of the rows returned.
        let project = Project::find_by_id(pool, project_id)
            .await?
            .ok_or(GraphError::ProjectNotFound)?;
        let nodes = Task::find_by_project_id(pool, project_id)
            .await?
            .into_iter()
            .map(FlowNode::from)
            .collect();
        let edges = Edge::find_by_project_id(pool, project_id)
            .await?
            .into_iter()
            .map(FlowEdge::from)
            .collect();

        Ok(ProjectGraph {
            project_id,
            version: project.graph_version,
            nodes,
            edges,
        })
    }

    /// Replaces the persisted graph with `snapshot` in a single transaction.
    ///
    /// Every existing task and edge of the project is deleted, then the
    /// snapshot's tasks are inserted under fresh ids, then its edges with
    /// their endpoints remapped to those ids. Nothing is visible to other
    /// readers until the commit; any failure rolls the whole batch back.
    /// When `expected_version` is set and no longer matches, nothing is
    /// written and `VersionConflict` is returned.
    pub async fn replace(
        pool: &SqlitePool,
        project_id: Uuid,
        snapshot: &GraphSnapshot,
    ) -> Result<Self, GraphError> {
        snapshot.validate()?;

        let mut tx = pool.begin().await?;

        // Bumping first takes SQLite's write lock, so the version compared
        // below cannot move until this transaction ends.
        let version = Project::bump_graph_version(&mut tx, project_id)
            .await?
            .ok_or(GraphError::ProjectNotFound)?;
        let current = version - 1;
        match snapshot.expected_version {
            Some(expected) if expected != current => {
                return Err(GraphError::VersionConflict {
                    expected,
                    actual: current,
                });
            }
            _ => {}
        }

        let removed_edges = sqlx::query("DELETE FROM edges WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let removed_tasks = sqlx::query("DELETE FROM tasks WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut id_map: HashMap<&str, Uuid> = HashMap::with_capacity(snapshot.nodes.len());
        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        for node in &snapshot.nodes {
            let task = Task::insert(
                &mut tx,
                Uuid::new_v4(),
                project_id,
                &node.node_type,
                node.position,
                &node.data,
            )
            .await?;
            id_map.insert(node.id.as_str(), task.id);
            nodes.push(FlowNode::from(task));
        }

        let mut edges = Vec::with_capacity(snapshot.edges.len());
        for edge in &snapshot.edges {
            let (Some(&source), Some(&target)) = (
                id_map.get(edge.source.as_str()),
                id_map.get(edge.target.as_str()),
            ) else {
                let missing = if id_map.contains_key(edge.source.as_str()) {
                    &edge.target
                } else {
                    &edge.source
                };
                return Err(GraphError::UnknownNodeReference {
                    edge_id: edge.id.clone(),
                    node_id: missing.clone(),
                });
            };

            let row = EdgeRow {
                source,
                target,
                edge_type: &edge.edge_type,
                source_handle: edge.source_handle.as_deref(),
                target_handle: edge.target_handle.as_deref(),
                label: edge.label.as_deref(),
                style: edge.style.as_ref(),
                animated: edge.animated,
            };
            let inserted = Edge::insert(&mut tx, Uuid::new_v4(), project_id, row).await?;
            edges.push(FlowEdge::from(inserted));
        }

        tx.commit().await?;

        tracing::debug!(
            %project_id,
            removed_tasks,
            removed_edges,
            inserted_tasks = nodes.len(),
            inserted_edges = edges.len(),
            version,
            "replaced project graph"
        );

        Ok(ProjectGraph {
            project_id,
            version,
            nodes,
            edges,
        })
    }
}
