use axum::{
    Extension, Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::graph::{GraphSnapshot, ProjectGraph};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, middleware::ProjectAccess};

pub async fn get_graph(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> Result<ResponseJson<ApiResponse<ProjectGraph>>, ApiError> {
    let graph = ProjectGraph::load(state.pool(), access.project_id()).await?;
    Ok(ResponseJson(ApiResponse::success(graph)))
}

/// Bulk replace: the snapshot becomes the project's whole graph, or nothing
/// changes.
pub async fn replace_graph(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Json(snapshot): Json<GraphSnapshot>,
) -> Result<ResponseJson<ApiResponse<ProjectGraph>>, ApiError> {
    let project_id = access.project_id();
    let graph = match ProjectGraph::replace(state.pool(), project_id, &snapshot).await {
        Ok(graph) => graph,
        Err(err) => {
            tracing::warn!(%project_id, error = %err, "graph replace rejected");
            return Err(err.into());
        }
    };

    tracing::info!(
        %project_id,
        version = graph.version,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "saved project graph"
    );
    Ok(ResponseJson(ApiResponse::success(graph)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/graph", get(get_graph).put(replace_graph))
}
