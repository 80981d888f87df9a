use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::models::{
    project::Project,
    user_to_project::{ProjectRole, UserToProject},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, identity::Viewer};

/// The project a request is scoped to together with the viewer's role on it.
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub project: Project,
    pub role: ProjectRole,
}

impl ProjectAccess {
    pub fn project_id(&self) -> Uuid {
        self.project.id
    }

    pub fn require_coach(&self) -> Result<(), ApiError> {
        if self.role.is_coach() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Only coaches can perform this action".to_string(),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectPath {
    project_id: Uuid,
}

/// Loads the project named in the path and resolves the viewer's role on it.
/// Missing projects are 404; viewers without an assignment are 403.
pub async fn load_project_access(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(ProjectPath { project_id }): Path<ProjectPath>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let project = Project::find_by_id(state.pool(), project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let Some(role) = UserToProject::resolve_role(state.pool(), &viewer.user_id, project_id).await?
    else {
        tracing::warn!(%project_id, user_id = %viewer.user_id, "viewer is not assigned to project");
        return Err(ApiError::Forbidden(
            "You do not have access to this project".to_string(),
        ));
    };

    request
        .extensions_mut()
        .insert(ProjectAccess { project, role });

    Ok(next.run(request).await)
}
