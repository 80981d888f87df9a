use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, put},
};
use db::models::edge::{
    CreateEdge, Edge, EdgeStyle, FlowEdge, UpdateEdgeAnimation, UpdateEdgeLabel,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::ProjectAccess};

#[derive(Debug, Deserialize)]
pub struct EdgePath {
    edge_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EdgePairQuery {
    pub source: Uuid,
    pub target: Uuid,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct RemovedEdges {
    pub removed: u64,
}

pub async fn get_edges(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> Result<ResponseJson<ApiResponse<Vec<FlowEdge>>>, ApiError> {
    let edges = Edge::find_by_project_id(state.pool(), access.project_id())
        .await?
        .into_iter()
        .map(FlowEdge::from)
        .collect();
    Ok(ResponseJson(ApiResponse::success(edges)))
}

pub async fn create_edge(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Json(payload): Json<CreateEdge>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<FlowEdge>>), ApiError> {
    let edge = Edge::create(state.pool(), access.project_id(), &payload).await?;
    tracing::debug!(project_id = %access.project_id(), edge_id = %edge.id, "created edge");
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(FlowEdge::from(edge))),
    ))
}

/// Removes every edge from `source` to `target` in one statement.
pub async fn delete_edges_between(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Query(query): Query<EdgePairQuery>,
) -> Result<ResponseJson<ApiResponse<RemovedEdges>>, ApiError> {
    let removed =
        Edge::delete_between(state.pool(), access.project_id(), query.source, query.target)
            .await?;
    Ok(ResponseJson(ApiResponse::success(RemovedEdges { removed })))
}

pub async fn update_edge_style(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(EdgePath { edge_id }): Path<EdgePath>,
    Json(payload): Json<EdgeStyle>,
) -> Result<ResponseJson<ApiResponse<FlowEdge>>, ApiError> {
    let edge = Edge::update_style(state.pool(), access.project_id(), edge_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(FlowEdge::from(edge))))
}

pub async fn update_edge_label(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(EdgePath { edge_id }): Path<EdgePath>,
    Json(payload): Json<UpdateEdgeLabel>,
) -> Result<ResponseJson<ApiResponse<FlowEdge>>, ApiError> {
    let edge =
        Edge::update_label(state.pool(), access.project_id(), edge_id, &payload.label).await?;
    Ok(ResponseJson(ApiResponse::success(FlowEdge::from(edge))))
}

pub async fn set_edge_animated(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(EdgePath { edge_id }): Path<EdgePath>,
    Json(payload): Json<UpdateEdgeAnimation>,
) -> Result<ResponseJson<ApiResponse<FlowEdge>>, ApiError> {
    let edge =
        Edge::set_animated(state.pool(), access.project_id(), edge_id, payload.animated).await?;
    Ok(ResponseJson(ApiResponse::success(FlowEdge::from(edge))))
}

pub async fn delete_edge(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(EdgePath { edge_id }): Path<EdgePath>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    Edge::delete(state.pool(), access.project_id(), edge_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route(
            "/",
            get(get_edges).post(create_edge).delete(delete_edges_between),
        )
        .route("/{edge_id}", delete(delete_edge))
        .route("/{edge_id}/style", put(update_edge_style))
        .route("/{edge_id}/label", put(update_edge_label))
        .route("/{edge_id}/animated", put(set_edge_animated));

    Router::new().nest("/edges", inner)
}
