use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::{Selector, StoreError};
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// Query parameters naming exactly one group or one teacher.
#[derive(Debug, Deserialize)]
pub struct SelectorParams {
    pub group: Option<String>,
    pub teacher: Option<String>,
}

impl SelectorParams {
    fn selector(self) -> Result<Selector, Response> {
        match (self.group, self.teacher) {
            (Some(group), None) if !group.trim().is_empty() => Ok(Selector::Group(group)),
            (None, Some(teacher)) if !teacher.trim().is_empty() => Ok(Selector::Teacher(teacher)),
            _ => Err(ApiErrorType::from((
                StatusCode::BAD_REQUEST,
                "Specify exactly one of `group` or `teacher`",
                None,
            ))
            .into_response()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleParams {
    #[serde(flatten)]
    pub selector: SelectorParams,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct TeacherParams {
    pub teacher: String,
}

fn store_error(context: &str, e: StoreError) -> Response {
    ApiErrorType::from((
        StatusCode::INTERNAL_SERVER_ERROR,
        context,
        Some(e.to_string()),
    ))
    .into_response()
}

/// GET /groups
/// Returns every group code, alphabetically
pub async fn get_groups(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /groups");

    match s.store.distinct_groups() {
        Ok(groups) => (StatusCode::OK, Json(groups)).into_response(),
        Err(e) => store_error("Failed to fetch groups", e),
    }
}

/// GET /teachers
/// Returns every individual teacher, alphabetically
pub async fn get_teachers(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /teachers");

    match s.store.distinct_teachers() {
        Ok(teachers) => (StatusCode::OK, Json(teachers)).into_response(),
        Err(e) => store_error("Failed to fetch teachers", e),
    }
}

/// GET /dates?group=..|teacher=..
/// Returns the days with anything scheduled for the group or teacher
pub async fn get_dates(
    State(s): State<Arc<AppState>>,
    Query(params): Query<SelectorParams>,
) -> Response {
    let selector = match params.selector() {
        Ok(selector) => selector,
        Err(response) => return response,
    };
    info!("GET /dates for {:?}", selector);

    match s.store.available_dates(&selector) {
        Ok(dates) => (StatusCode::OK, Json(dates)).into_response(),
        Err(e) => store_error("Failed to fetch dates", e),
    }
}

/// GET /schedule?group=..|teacher=..&date=..
/// Returns the lessons for one day, announcements first
pub async fn get_schedule(
    State(s): State<Arc<AppState>>,
    Query(params): Query<ScheduleParams>,
) -> Response {
    let selector = match params.selector.selector() {
        Ok(selector) => selector,
        Err(response) => return response,
    };
    info!("GET /schedule for {:?} on {}", selector, params.date);

    match s.store.schedule_for(&selector, &params.date) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => store_error("Failed to fetch schedule", e),
    }
}

/// GET /co_teachers?teacher=..
/// Returns the teachers who share a co-taught lesson with the given one
pub async fn get_co_teachers(
    State(s): State<Arc<AppState>>,
    Query(params): Query<TeacherParams>,
) -> Response {
    info!("GET /co_teachers for {}", params.teacher);

    match s.store.co_teachers(&params.teacher) {
        Ok(teachers) => (StatusCode::OK, Json(teachers)).into_response(),
        Err(e) => store_error("Failed to fetch co-teachers", e),
    }
}
