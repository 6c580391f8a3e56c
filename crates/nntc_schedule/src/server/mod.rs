use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::server::endpoints::{contacts, schedule, status};
use crate::types::AppState;

mod endpoints;
mod types;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Read-only views over the current snapshot
    let schedule_router = Router::new()
        .route("/groups", get(schedule::get_groups))
        .route("/teachers", get(schedule::get_teachers))
        .route("/dates", get(schedule::get_dates))
        .route("/schedule", get(schedule::get_schedule))
        .route("/co_teachers", get(schedule::get_co_teachers));

    Router::new()
        .route("/health", get(status::get_health))
        .route("/contacts/:chat_id", post(contacts::post_touch_contact))
        .merge(schedule_router)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ScheduleStore;
    use crate::record::ScheduleRecord;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn lesson(group: &str, teacher: &str, lesson_number: &str) -> ScheduleRecord {
        ScheduleRecord {
            date: "2 июня".to_string(),
            day: "понедельник".to_string(),
            group: group.to_string(),
            teacher: teacher.to_string(),
            subject: "Информатика".to_string(),
            lesson_number: lesson_number.to_string(),
            classroom: "204".to_string(),
            arrival_time: String::new(),
        }
    }

    fn app() -> (TempDir, Arc<ScheduleStore>, Router) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ScheduleStore::open(dir.path().join("database.db")).unwrap());
        store
            .replace_schedule(&[
                lesson("1Б-24-1", "Иванов И.И./Петров П.П.", "2"),
                lesson("1Б-24-1", "Сидоров С.С.", "1"),
                lesson("2А-23-1", "Петров П.П.", "3"),
            ])
            .unwrap();
        let router = create_router(Arc::new(AppState::new(store.clone())));
        (dir, store, router)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, _store, router) = app();
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"], 3);
        assert_eq!(body["stage"], "idle");
    }

    #[tokio::test]
    async fn test_teachers_are_split() {
        let (_dir, _store, router) = app();
        let (status, body) = get_json(router, "/teachers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!(["Иванов И.И.", "Петров П.П.", "Сидоров С.С."])
        );
    }

    #[tokio::test]
    async fn test_schedule_for_group() {
        let (_dir, _store, router) = app();
        let uri = "/schedule?group=1%D0%91-24-1&date=2%20%D0%B8%D1%8E%D0%BD%D1%8F";
        let (status, body) = get_json(router, uri).await;

        assert_eq!(status, StatusCode::OK);
        let lessons: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["lesson_number"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(lessons, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_dates_require_one_selector() {
        let (_dir, _store, router) = app();
        let (status, body) = get_json(router.clone(), "/dates").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = get_json(router, "/dates?group=a&teacher=b").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_touch_contact() {
        let (_dir, store, router) = app();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/contacts/12345")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let contacts = store.contacts().unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].chat_id, 12345);
    }
}
