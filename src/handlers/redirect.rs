use crate::{error::LinkError, AppState};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use url::Url;

/// GET /:code
///
/// 1. Resolve the code through the link service (404 if unknown).
/// 2. Build the `Location` header; a target that cannot become one is a 500
///    and the visit is not counted.
/// 3. The service counts the click in the background, so the response does
///    not wait for the write.
/// 4. Return a 302 to the stored target URL.
pub async fn redirect(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    match state.service.resolve_and_count(&code, location).await {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Use the stored URL verbatim when it is plain ASCII and header-safe,
/// otherwise its percent-encoded serialization.
fn location(target_url: &str) -> Result<HeaderValue, LinkError> {
    if target_url.is_ascii() {
        if let Ok(value) = HeaderValue::from_str(target_url) {
            return Ok(value);
        }
    }

    Url::parse(target_url)
        .ok()
        .and_then(|normalized| HeaderValue::from_str(normalized.as_str()).ok())
        .ok_or_else(|| LinkError::UnusableTarget(target_url.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_targets_are_used_verbatim() {
        let value = location("https://example.com/a?b=c").unwrap();
        assert_eq!(value, "https://example.com/a?b=c");
    }

    #[test]
    fn non_ascii_targets_are_percent_encoded() {
        let value = location("https://example.com/caf\u{e9}").unwrap();
        assert_eq!(value, "https://example.com/caf%C3%A9");
    }

    #[test]
    fn unparseable_non_ascii_target_is_unusable() {
        let err = location("caf\u{e9} is not a url").unwrap_err();
        assert!(matches!(err, LinkError::UnusableTarget(_)));
    }
}
