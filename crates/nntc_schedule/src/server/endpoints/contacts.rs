use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// POST /contacts/:chat_id
/// Records an inbound interaction so the chat receives update notifications
pub async fn post_touch_contact(
    Path(chat_id): Path<i64>,
    State(s): State<Arc<AppState>>,
) -> Response {
    debug!(chat_id, "POST /contacts");

    match s.store.touch_contact(chat_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(chat_id, error = %e, "Failed to record contact");
            ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to record contact",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }
}
