use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, identity::DirectoryUser};

pub async fn list_directory_users(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<DirectoryUser>>>, ApiError> {
    let users = state.identity().list_users().await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/directory/users", get(list_directory_users))
}
