use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::ingest::Stage;
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// GET /health
/// Reports the size of the current snapshot and what the pipeline is doing
pub async fn get_health(State(s): State<Arc<AppState>>) -> Response {
    let stage = s
        .pipeline
        .as_ref()
        .map(|p| p.stage())
        .unwrap_or(Stage::Idle);

    match s.store.record_count() {
        Ok(records) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "records": records,
                "stage": stage.as_str(),
            })),
        )
            .into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::SERVICE_UNAVAILABLE,
            "Schedule store unavailable",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}
