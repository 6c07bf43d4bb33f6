use crate::{
    error::{error_response, LinkError},
    models::{CreateLinkRequest, CreateLinkResponse, Link},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// GET /api/links
pub async fn list_links(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Link>>, LinkError> {
    Ok(Json(state.service.list().await?))
}

/// POST /api/links
///
/// Body: `{"target_url": "...", "code": "..."}`. A missing or empty `code`
/// asks for a generated one.
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(%rejection, "Rejected create request body");
            return error_response(StatusCode::BAD_REQUEST, "Request body must be a JSON object");
        }
    };

    let target_url = request.target_url.unwrap_or_default();
    let code = request.code.as_deref().filter(|c| !c.is_empty());

    match state.service.create(&target_url, code).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(CreateLinkResponse::from(created)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/links/:code
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Link>, LinkError> {
    Ok(Json(state.service.get(&code).await?))
}

/// DELETE /api/links/:code
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<StatusCode, LinkError> {
    state.service.delete(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}
