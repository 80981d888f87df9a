use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::warn;

use crate::{AppState, error::ApiError};

/// Rejects requests without a valid bearer token and makes the verified
/// [`Viewer`](crate::identity::Viewer) available as a request extension.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let bearer = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => bearer,
        None => return ApiError::Unauthorized.into_response(),
    };

    match state.identity().verify(bearer.token()).await {
        Ok(viewer) => {
            req.extensions_mut().insert(viewer);
            next.run(req).await
        }
        Err(err) if err.is_unauthenticated() => {
            warn!(?err, "failed to verify session token");
            ApiError::Unauthorized.into_response()
        }
        Err(err) => ApiError::Identity(err).into_response(),
    }
}
