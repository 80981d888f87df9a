use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::{SyncUser, User, UserError};
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, identity::Viewer};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersQuery {
    /// Comma-separated token identifiers; lists every user when absent.
    pub token_identifiers: Option<String>,
}

pub async fn sync_current_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(payload): Json<SyncUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::sync(state.pool(), &viewer.user_id, &payload).await?;
    tracing::debug!(user_id = %viewer.user_id, "synced user profile");
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::find_by_token_identifier(state.pool(), &viewer.user_id)
        .await?
        .ok_or(UserError::UserNotFound)?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn get_users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = match query.token_identifiers {
        Some(raw) => {
            let token_identifiers: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            User::find_by_token_identifiers(state.pool(), &token_identifiers).await?
        }
        None => User::find_all(state.pool()).await?,
    };
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(token_identifier): Path<String>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::find_by_token_identifier(state.pool(), &token_identifier)
        .await?
        .ok_or(UserError::UserNotFound)?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/", get(get_users))
        .route("/me", get(get_current_user))
        .route("/me/sync", post(sync_current_user))
        .route("/{token_identifier}", get(get_user));

    Router::new().nest("/users", inner)
}
