use uuid::Uuid;

use crate::{
    client::{ClientError, GraphBackend},
    editor::{GraphEditor, RefreshOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The editor was clean or a save was already in flight.
    NothingToSave,
    Saved { version: i64 },
}

/// Runs one save round trip: freeze the working copy, replace the persisted
/// graph, then settle the editor with the server's answer.
pub async fn save<B>(editor: &mut GraphEditor, backend: &B) -> Result<SaveOutcome, ClientError>
where
    B: GraphBackend + ?Sized,
{
    let Some(snapshot) = editor.begin_save() else {
        return Ok(SaveOutcome::NothingToSave);
    };

    match backend.replace_graph(editor.project_id(), &snapshot).await {
        Ok(graph) => {
            let version = graph.version;
            editor.finish_save(Ok(graph));
            Ok(SaveOutcome::Saved { version })
        }
        Err(err) => {
            editor.finish_save(Err(err.to_string()));
            Err(err)
        }
    }
}

/// Fetches the latest graph and offers it to the editor.
pub async fn refresh<B>(editor: &mut GraphEditor, backend: &B) -> Result<RefreshOutcome, ClientError>
where
    B: GraphBackend + ?Sized,
{
    let graph = backend.load_graph(editor.project_id()).await?;
    Ok(editor.receive_refresh(graph))
}

/// Loads a project's graph into a fresh editor.
pub async fn open<B>(backend: &B, project_id: Uuid) -> Result<GraphEditor, ClientError>
where
    B: GraphBackend + ?Sized,
{
    let graph = backend.load_graph(project_id).await?;
    tracing::debug!(%project_id, version = graph.version, "opened project graph");
    Ok(GraphEditor::new(graph))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use db::models::{
        graph::{GraphSnapshot, ProjectGraph},
        task::Position,
    };
    use tokio::sync::Mutex;

    use super::*;
    use crate::editor::SyncState;

    /// In-memory stand-in for the server: checks the base version and
    /// assigns fresh ids the way the real replace does.
    struct MemoryBackend {
        graph: Mutex<ProjectGraph>,
    }

    impl MemoryBackend {
        fn new() -> Self {
            Self {
                graph: Mutex::new(ProjectGraph {
                    project_id: Uuid::nil(),
                    version: 0,
                    nodes: Vec::new(),
                    edges: Vec::new(),
                }),
            }
        }

        async fn bump(&self) {
            self.graph.lock().await.version += 1;
        }
    }

    #[async_trait]
    impl GraphBackend for MemoryBackend {
        async fn load_graph(&self, _project_id: Uuid) -> Result<ProjectGraph, ClientError> {
            Ok(self.graph.lock().await.clone())
        }

        async fn replace_graph(
            &self,
            _project_id: Uuid,
            snapshot: &GraphSnapshot,
        ) -> Result<ProjectGraph, ClientError> {
            let mut graph = self.graph.lock().await;
            if snapshot.expected_version.is_some_and(|v| v != graph.version) {
                return Err(ClientError::Api {
                    status: 409,
                    message: "graph was modified concurrently".to_string(),
                });
            }

            let mut ids = HashMap::new();
            let nodes = snapshot
                .nodes
                .iter()
                .map(|node| {
                    let id = Uuid::new_v4().to_string();
                    ids.insert(node.id.clone(), id.clone());
                    let mut node = node.clone();
                    node.id = id;
                    node
                })
                .collect();
            let edges = snapshot
                .edges
                .iter()
                .map(|edge| {
                    let mut edge = edge.clone();
                    edge.id = Uuid::new_v4().to_string();
                    edge.source = ids[&edge.source].clone();
                    edge.target = ids[&edge.target].clone();
                    edge
                })
                .collect();

            graph.nodes = nodes;
            graph.edges = edges;
            graph.version += 1;
            Ok(graph.clone())
        }
    }

    #[tokio::test]
    async fn save_round_trip_adopts_persisted_ids() {
        let backend = MemoryBackend::new();
        let mut editor = open(&backend, Uuid::nil()).await.unwrap();

        let a = editor.add_node(Position::default()).unwrap();
        let b = editor.add_node(Position { x: 100.0, y: 0.0 }).unwrap();
        editor.connect(&a, &b).unwrap();

        let outcome = save(&mut editor, &backend).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { version: 1 });
        assert_eq!(editor.state(), SyncState::Clean);
        assert!(editor.node(&a).is_none());

        let edge = &editor.edges()[0];
        assert_eq!(edge.source, editor.nodes()[0].id);
        assert_eq!(edge.target, editor.nodes()[1].id);
    }

    #[tokio::test]
    async fn save_while_clean_does_not_call_backend() {
        let backend = MemoryBackend::new();
        let mut editor = open(&backend, Uuid::nil()).await.unwrap();

        let outcome = save(&mut editor, &backend).await.unwrap();
        assert_eq!(outcome, SaveOutcome::NothingToSave);
        assert_eq!(backend.graph.lock().await.version, 0);
    }

    #[tokio::test]
    async fn stale_save_leaves_editor_dirty() {
        let backend = MemoryBackend::new();
        let mut editor = open(&backend, Uuid::nil()).await.unwrap();
        editor.add_node(Position::default()).unwrap();

        backend.bump().await;

        let err = save(&mut editor, &backend).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(editor.state(), SyncState::Dirty);
        assert_eq!(editor.nodes().len(), 1);
        assert!(editor.last_error().is_some());
    }

    #[tokio::test]
    async fn refresh_waits_for_dirty_editor() {
        let backend = MemoryBackend::new();
        let mut editor = open(&backend, Uuid::nil()).await.unwrap();
        editor.add_node(Position::default()).unwrap();

        backend.bump().await;
        let outcome = refresh(&mut editor, &backend).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Deferred);
        assert_eq!(editor.nodes().len(), 1);

        editor.discard_changes().unwrap();
        assert_eq!(editor.base_version(), 1);
        assert!(editor.nodes().is_empty());
    }
}
