use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, put},
};
use db::models::task::{CreateTask, FlowNode, Task, TaskData, UpdateTaskPosition};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::ProjectAccess};

#[derive(Debug, Deserialize)]
pub struct TaskPath {
    task_id: Uuid,
}

pub async fn get_tasks(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> Result<ResponseJson<ApiResponse<Vec<FlowNode>>>, ApiError> {
    let tasks = Task::find_by_project_id(state.pool(), access.project_id())
        .await?
        .into_iter()
        .map(FlowNode::from)
        .collect();
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Json(payload): Json<CreateTask>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<FlowNode>>), ApiError> {
    let task = Task::create(state.pool(), access.project_id(), &payload).await?;
    tracing::debug!(project_id = %access.project_id(), task_id = %task.id, "created task");
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(FlowNode::from(task))),
    ))
}

pub async fn update_task_position(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(TaskPath { task_id }): Path<TaskPath>,
    Json(payload): Json<UpdateTaskPosition>,
) -> Result<ResponseJson<ApiResponse<FlowNode>>, ApiError> {
    let task =
        Task::update_position(state.pool(), access.project_id(), task_id, payload.position)
            .await?;
    Ok(ResponseJson(ApiResponse::success(FlowNode::from(task))))
}

pub async fn update_task_data(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(TaskPath { task_id }): Path<TaskPath>,
    Json(payload): Json<TaskData>,
) -> Result<ResponseJson<ApiResponse<FlowNode>>, ApiError> {
    let task = Task::update_data(state.pool(), access.project_id(), task_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(FlowNode::from(task))))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(TaskPath { task_id }): Path<TaskPath>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    Task::delete(state.pool(), access.project_id(), task_id).await?;
    tracing::debug!(project_id = %access.project_id(), %task_id, "deleted task");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .route("/{task_id}", delete(delete_task))
        .route("/{task_id}/position", put(update_task_position))
        .route("/{task_id}/data", put(update_task_data));

    Router::new().nest("/tasks", inner)
}
