use std::collections::HashSet;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::user_to_project::{AssignUser, ProjectRole, UserToProject};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, identity::DirectoryUser, middleware::ProjectAccess};

#[derive(Debug, Deserialize)]
pub struct MemberPath {
    user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MembersQuery {
    pub role: Option<ProjectRole>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateMemberRole {
    pub role: ProjectRole,
}

pub async fn get_members(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Query(query): Query<MembersQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<UserToProject>>>, ApiError> {
    let members = match query.role {
        Some(role) => {
            UserToProject::find_by_project_and_role(state.pool(), access.project_id(), role)
                .await?
        }
        None => UserToProject::find_by_project(state.pool(), access.project_id()).await?,
    };
    Ok(ResponseJson(ApiResponse::success(members)))
}

pub async fn assign_member(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Json(payload): Json<AssignUser>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<UserToProject>>), ApiError> {
    access.require_coach()?;
    let user_id = payload.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("userId must not be empty".to_string()));
    }

    let assignment = UserToProject::assign(
        state.pool(),
        access.project_id(),
        &AssignUser {
            user_id: user_id.to_string(),
            role: payload.role,
        },
    )
    .await?;
    tracing::info!(
        project_id = %access.project_id(),
        user_id = %assignment.user_id,
        role = ?assignment.role,
        "assigned user to project"
    );
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(assignment)),
    ))
}

/// Directory users not yet assigned to the project.
pub async fn get_member_candidates(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> Result<ResponseJson<ApiResponse<Vec<DirectoryUser>>>, ApiError> {
    access.require_coach()?;
    let assigned: HashSet<String> = UserToProject::find_by_project(state.pool(), access.project_id())
        .await?
        .into_iter()
        .map(|assignment| assignment.user_id)
        .collect();

    let candidates = state
        .identity()
        .list_users()
        .await?
        .into_iter()
        .filter(|user| !assigned.contains(&user.id))
        .collect();
    Ok(ResponseJson(ApiResponse::success(candidates)))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(MemberPath { user_id }): Path<MemberPath>,
    Json(payload): Json<UpdateMemberRole>,
) -> Result<ResponseJson<ApiResponse<UserToProject>>, ApiError> {
    access.require_coach()?;
    let assignment =
        UserToProject::update_role(state.pool(), access.project_id(), &user_id, payload.role)
            .await?;
    tracing::info!(
        project_id = %access.project_id(),
        %user_id,
        role = ?assignment.role,
        "updated project role"
    );
    Ok(ResponseJson(ApiResponse::success(assignment)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(MemberPath { user_id }): Path<MemberPath>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    access.require_coach()?;
    UserToProject::remove(state.pool(), access.project_id(), &user_id).await?;
    tracing::info!(project_id = %access.project_id(), %user_id, "removed user from project");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/", get(get_members).post(assign_member))
        .route("/candidates", get(get_member_candidates))
        .route("/{user_id}", put(update_member_role).delete(remove_member));

    Router::new().nest("/members", inner)
}
