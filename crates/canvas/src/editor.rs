use db::models::{
    edge::{DEFAULT_EDGE_TYPE, EdgeStyle, FlowEdge},
    graph::{GraphSnapshot, ProjectGraph},
    task::{DEFAULT_NODE_TYPE, FlowNode, Position, TaskData},
};
use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Local graph equals the last graph acknowledged by the server.
    Clean,
    /// Local edits exist that have not been persisted.
    Dirty,
    /// A snapshot has been handed to the backend and not yet resolved.
    Saving,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("a save is in flight; edits are rejected until it resolves")]
    SaveInFlight,
    #[error("node `{0}` does not exist")]
    UnknownNode(String),
    #[error("edge `{0}` does not exist")]
    UnknownEdge(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// Held until local edits are saved or discarded.
    Deferred,
    /// Older than the graph already held; dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    /// Unsaved edits would be lost; ask the user first.
    ConfirmDiscard,
}

/// Local working copy of a project's graph and its save lifecycle.
///
/// Edits mutate the working copy and mark it dirty. `begin_save` freezes it
/// into a snapshot; `finish_save` either adopts the server's graph or returns
/// to dirty with the edits intact. Server refreshes never overwrite unsaved
/// edits: they are held until the editor is clean again or the edits are
/// discarded.
#[derive(Debug, Clone)]
pub struct GraphEditor {
    project_id: Uuid,
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    saved: ProjectGraph,
    pending_refresh: Option<ProjectGraph>,
    state: SyncState,
    last_error: Option<String>,
}

impl GraphEditor {
    pub fn new(graph: ProjectGraph) -> Self {
        let mut editor = Self {
            project_id: graph.project_id,
            nodes: Vec::new(),
            edges: Vec::new(),
            saved: graph.clone(),
            pending_refresh: None,
            state: SyncState::Clean,
            last_error: None,
        };
        editor.adopt(graph);
        editor
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state != SyncState::Clean
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&FlowEdge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    /// Version of the last graph acknowledged by the server.
    pub fn base_version(&self) -> i64 {
        self.saved.version
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_pending_refresh(&self) -> bool {
        self.pending_refresh.is_some()
    }

    // ------------------------------------------------------------------
    // Local edits
    // ------------------------------------------------------------------

    /// Adds a task node labelled `Task N` (N = node count + 1) and returns
    /// its local id.
    pub fn add_node(&mut self, position: Position) -> Result<String, EditError> {
        self.ensure_editable()?;
        let id = local_id();
        self.nodes.push(FlowNode {
            id: id.clone(),
            node_type: DEFAULT_NODE_TYPE.to_string(),
            position,
            data: TaskData {
                label: format!("Task {}", self.nodes.len() + 1),
                ..TaskData::default()
            },
        });
        self.mark_dirty();
        Ok(id)
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.node_mut(id)?.position = position;
        self.mark_dirty();
        Ok(())
    }

    pub fn relabel_node(&mut self, id: &str, label: &str) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.node_mut(id)?.data.label = label.to_string();
        self.mark_dirty();
        Ok(())
    }

    pub fn update_node_data(&mut self, id: &str, data: TaskData) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.node_mut(id)?.data = data;
        self.mark_dirty();
        Ok(())
    }

    /// Removes the node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<(), EditError> {
        self.ensure_editable()?;
        let before = self.nodes.len();
        self.nodes.retain(|node| node.id != id);
        if self.nodes.len() == before {
            return Err(EditError::UnknownNode(id.to_string()));
        }
        self.edges
            .retain(|edge| edge.source != id && edge.target != id);
        self.mark_dirty();
        Ok(())
    }

    /// Connects two existing nodes and returns the new edge's local id.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<String, EditError> {
        self.ensure_editable()?;
        for endpoint in [source, target] {
            if self.node(endpoint).is_none() {
                return Err(EditError::UnknownNode(endpoint.to_string()));
            }
        }

        let id = local_id();
        self.edges.push(FlowEdge {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
            edge_type: DEFAULT_EDGE_TYPE.to_string(),
            source_handle: None,
            target_handle: None,
            label: None,
            style: None,
            animated: None,
        });
        self.mark_dirty();
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<(), EditError> {
        self.ensure_editable()?;
        let before = self.edges.len();
        self.edges.retain(|edge| edge.id != id);
        if self.edges.len() == before {
            return Err(EditError::UnknownEdge(id.to_string()));
        }
        self.mark_dirty();
        Ok(())
    }

    pub fn set_edge_label(&mut self, id: &str, label: Option<String>) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.edge_mut(id)?.label = label;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_edge_style(&mut self, id: &str, style: EdgeStyle) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.edge_mut(id)?.style = Some(style);
        self.mark_dirty();
        Ok(())
    }

    pub fn set_edge_animated(&mut self, id: &str, animated: bool) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.edge_mut(id)?.animated = Some(animated);
        self.mark_dirty();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Save lifecycle
    // ------------------------------------------------------------------

    /// Freezes the working copy for persistence. Returns `None` when there is
    /// nothing to save or a save is already in flight.
    pub fn begin_save(&mut self) -> Option<GraphSnapshot> {
        if self.state != SyncState::Dirty {
            return None;
        }
        self.state = SyncState::Saving;
        self.last_error = None;
        Some(GraphSnapshot {
            expected_version: Some(self.saved.version),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        })
    }

    /// Resolves the in-flight save. On success the server's graph (with its
    /// persisted ids) replaces the working copy; on failure the edits stay and
    /// the editor returns to dirty.
    pub fn finish_save(&mut self, result: Result<ProjectGraph, String>) {
        if self.state != SyncState::Saving {
            tracing::warn!(project_id = %self.project_id, "save resolved with none in flight");
            return;
        }

        match result {
            Ok(graph) => {
                tracing::debug!(
                    project_id = %self.project_id,
                    version = graph.version,
                    "save acknowledged"
                );
                self.adopt(graph);
                // A refresh at or below the saved version is superseded.
                if let Some(pending) = self.pending_refresh.take() {
                    if pending.version > self.saved.version {
                        self.adopt(pending);
                    }
                }
            }
            Err(message) => {
                tracing::warn!(project_id = %self.project_id, error = %message, "save failed");
                self.state = SyncState::Dirty;
                self.last_error = Some(message);
            }
        }
    }

    /// Offers a graph fetched from the server. Applied only while clean.
    pub fn receive_refresh(&mut self, graph: ProjectGraph) -> RefreshOutcome {
        if graph.version < self.saved.version {
            return RefreshOutcome::Stale;
        }

        match self.state {
            SyncState::Clean => {
                self.adopt(graph);
                RefreshOutcome::Applied
            }
            SyncState::Dirty | SyncState::Saving => {
                let newer = self
                    .pending_refresh
                    .as_ref()
                    .is_none_or(|pending| graph.version >= pending.version);
                if newer {
                    self.pending_refresh = Some(graph);
                }
                RefreshOutcome::Deferred
            }
        }
    }

    /// Drops local edits, taking the most recent pending refresh if any,
    /// otherwise the last saved graph.
    pub fn discard_changes(&mut self) -> Result<(), EditError> {
        self.ensure_editable()?;
        let graph = self
            .pending_refresh
            .take()
            .unwrap_or_else(|| self.saved.clone());
        self.adopt(graph);
        Ok(())
    }

    pub fn navigation_guard(&self) -> NavigationDecision {
        match self.state {
            SyncState::Clean => NavigationDecision::Proceed,
            SyncState::Dirty | SyncState::Saving => NavigationDecision::ConfirmDiscard,
        }
    }

    /// The user confirmed leaving; unsaved edits are dropped without being
    /// persisted. Refused while a save is in flight so its acknowledgement
    /// still lands.
    pub fn confirm_navigation(&mut self) -> Result<(), EditError> {
        self.discard_changes()
    }

    fn adopt(&mut self, graph: ProjectGraph) {
        // Edges left behind by a deleted task can be neither drawn nor saved.
        let node_ids: HashSet<&str> = graph.nodes.iter().map(|node| node.id.as_str()).collect();
        let edges = graph
            .edges
            .iter()
            .filter(|edge| {
                node_ids.contains(edge.source.as_str()) && node_ids.contains(edge.target.as_str())
            })
            .cloned()
            .collect();
        self.nodes = graph.nodes.clone();
        self.edges = edges;
        self.saved = graph;
        self.state = SyncState::Clean;
        self.last_error = None;
    }

    fn ensure_editable(&self) -> Result<(), EditError> {
        match self.state {
            SyncState::Saving => Err(EditError::SaveInFlight),
            SyncState::Clean | SyncState::Dirty => Ok(()),
        }
    }

    fn mark_dirty(&mut self) {
        self.state = SyncState::Dirty;
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut FlowNode, EditError> {
        self.nodes
            .iter_mut()
            .find(|node| node.id == id)
            .ok_or_else(|| EditError::UnknownNode(id.to_string()))
    }

    fn edge_mut(&mut self, id: &str) -> Result<&mut FlowEdge, EditError> {
        self.edges
            .iter_mut()
            .find(|edge| edge.id == id)
            .ok_or_else(|| EditError::UnknownEdge(id.to_string()))
    }
}

fn local_id() -> String {
    format!("local-{}", Uuid::new_v4())
}
