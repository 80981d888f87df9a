use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    project::{CreateProject, Project, ProjectError, ProjectWithRole, UpdateProject},
    user_to_project::{ProjectRole, UserToProject},
};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    identity::Viewer,
    middleware::{ProjectAccess, load_project_access},
    routes::{edges, graph, members, tasks},
};

/// The viewer's standing on a project.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAccessInfo {
    pub role: Option<ProjectRole>,
    pub has_access: bool,
    pub is_coach: bool,
}

pub async fn get_projects(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectWithRole>>>, ApiError> {
    let projects = Project::find_for_user(state.pool(), &viewer.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(payload): Json<CreateProject>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Project>>), ApiError> {
    let project = Project::create(state.pool(), &payload, &viewer.user_id).await?;
    tracing::info!(project_id = %project.id, user_id = %viewer.user_id, "created project");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(project))))
}

pub async fn get_project(
    Extension(access): Extension<ProjectAccess>,
) -> Result<ResponseJson<ApiResponse<ProjectWithRole>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(ProjectWithRole {
        project: access.project,
        role: access.role,
    })))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    access.require_coach()?;
    let project = Project::update(state.pool(), access.project_id(), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    access.require_coach()?;
    let rows_affected = Project::delete(state.pool(), access.project_id()).await?;
    if rows_affected == 0 {
        return Err(ProjectError::ProjectNotFound.into());
    }
    tracing::info!(project_id = %access.project_id(), "deleted project");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Never rejects: a viewer without an assignment gets `hasAccess: false`.
pub async fn get_project_access(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProjectAccessInfo>>, ApiError> {
    let role = UserToProject::resolve_role(state.pool(), &viewer.user_id, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(ProjectAccessInfo {
        role,
        has_access: role.is_some(),
        is_coach: role.is_some_and(ProjectRole::is_coach),
    })))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let project_id_router = Router::new()
        .route(
            "/",
            get(get_project).put(update_project).delete(delete_project),
        )
        .merge(graph::router())
        .merge(tasks::router())
        .merge(edges::router())
        .merge(members::router())
        .layer(from_fn_with_state(state.clone(), load_project_access));

    let inner = Router::new()
        .route("/", get(get_projects).post(create_project))
        .route("/{project_id}/access", get(get_project_access))
        .nest("/{project_id}", project_id_router);

    Router::new().nest("/projects", inner)
}
