use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{
    graph::GraphError, project::ProjectError, user::UserError, user_to_project::MembershipError,
};
use thiserror::Error;
use utils::response::ApiResponse;

use crate::identity::IdentityError;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Membership(#[from] MembershipError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                ProjectError::EmptyName => (StatusCode::BAD_REQUEST, "ProjectError"),
                ProjectError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Graph(err) => match err {
                GraphError::ProjectNotFound
                | GraphError::TaskNotFound
                | GraphError::EdgeNotFound => (StatusCode::NOT_FOUND, "GraphError"),
                GraphError::VersionConflict { .. } => (StatusCode::CONFLICT, "ConflictError"),
                GraphError::DuplicateNodeId(_) | GraphError::UnknownNodeReference { .. } => {
                    (StatusCode::BAD_REQUEST, "GraphError")
                }
                GraphError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Membership(err) => match err {
                MembershipError::AlreadyAssigned | MembershipError::LastCoach => {
                    (StatusCode::CONFLICT, "ConflictError")
                }
                MembershipError::NotAssigned | MembershipError::ProjectNotFound => {
                    (StatusCode::NOT_FOUND, "MembershipError")
                }
                MembershipError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError")
                }
            },
            ApiError::User(err) => match err {
                UserError::UserNotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Identity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IdentityError"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status();

        let error_message = if status_code.is_server_error() {
            tracing::error!(error = %self, error_type, "request failed");
            "Internal server error".to_string()
        } else {
            match &self {
                ApiError::Unauthorized => "Unauthorized. Please sign in again.".to_string(),
                ApiError::Forbidden(msg) | ApiError::NotFound(msg) | ApiError::BadRequest(msg) => {
                    msg.clone()
                }
                _ => self.to_string(),
            }
        };

        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
