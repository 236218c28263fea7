mod api;
mod pages;

pub use api::*;
pub use pages::*;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(courses_page))
        .route("/courses", get(courses_page))
        .route("/certificate", get(certificate_page))
        .route("/certificate/name", post(save_name))
        .route("/certificate/name/skip", post(skip_name))
        .route("/certificate/download", get(download_certificate))
        .route("/api/certificate/share", get(share_link))
        .route("/api/courses/cards", get(course_cards))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::bus::InsertionBus;
    use crate::a11y::{Enhancer, COURSE_CONTAINER};
    use crate::auth::{DISPLAY_NAME_HEADER, UID_HEADER};
    use crate::config::Config;
    use crate::db::memory::{course, enrollment, MemoryBackend};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    async fn app(backend: Arc<MemoryBackend>) -> Router {
        let bus = InsertionBus::new();
        bus.subscribe(Arc::new(Enhancer::watching(COURSE_CONTAINER))).await;
        router(Arc::new(AppState {
            backend,
            config: Arc::new(Config::for_tests()),
            rasterizer: None,
            pdf: None,
            bus,
        }))
    }

    async fn seeded() -> Arc<MemoryBackend> {
        Arc::new(
            MemoryBackend::with_records(
                vec![course("c1", "Rust Basics")],
                vec![enrollment("e1", "u1", "c1", 100)],
            )
            .await,
        )
    }

    fn signed_in(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .uri(uri)
            .header(UID_HEADER, "u1")
            .header(DISPLAY_NAME_HEADER, "Jane Doe")
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_form(uri: &str, form: &'static str) -> Request<Body> {
        signed_in(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap()
    }

    #[tokio::test]
    async fn test_certificate_page_requires_identity() {
        let app = app(seeded().await).await;

        let response = app
            .oneshot(Request::builder().uri("/certificate?courseId=c1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login.html");
    }

    #[tokio::test]
    async fn test_first_visit_issues_id_and_marks_prompt_asked() {
        let backend = seeded().await;
        let app = app(backend.clone()).await;

        let response = app
            .oneshot(signed_in("/certificate?courseId=c1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(cookie.starts_with("certificateNameAsked_e1=true"));

        let html = body_text(response).await;
        let issued = backend.enrollment("e1").await.unwrap().certificate_id.unwrap();
        assert!(html.contains(&issued));
        assert!(html.contains("id=\"certificate-name-modal\""));
        assert!(html.contains("Jane Doe"));
    }

    #[tokio::test]
    async fn test_asked_device_gets_no_prompt() {
        let app = app(seeded().await).await;

        let response = app
            .oneshot(
                signed_in("/certificate?courseId=c1")
                    .header(header::COOKIE, "certificateNameAsked_e1=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let html = body_text(response).await;
        assert!(!html.contains("id=\"certificate-name-modal\""));
    }

    #[tokio::test]
    async fn test_blank_name_redirects_back_to_prompt() {
        let backend = seeded().await;
        let app = app(backend.clone()).await;

        let response = app
            .oneshot(post_form("/certificate/name", "course_id=c1&enrollment_id=e1&name=+++"))
            .await
            .unwrap();

        assert_eq!(location(&response), "/certificate?courseId=c1&notice=name_required");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_saved_name_is_used_on_the_certificate() {
        let backend = seeded().await;
        let app = app(backend.clone()).await;

        let response = app
            .oneshot(post_form("/certificate/name", "course_id=c1&enrollment_id=e1&name=+J.+Doe+"))
            .await
            .unwrap();

        assert_eq!(location(&response), "/certificate?courseId=c1&notice=name_saved");
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        let stored = backend.enrollment("e1").await.unwrap();
        assert_eq!(stored.custom_certificate_name.as_deref(), Some("J. Doe"));
    }

    #[tokio::test]
    async fn test_skip_records_flag_without_writing() {
        let backend = seeded().await;
        let app = app(backend.clone()).await;

        let response = app
            .oneshot(post_form("/certificate/name/skip", "course_id=c1&enrollment_id=e1&reason=escape"))
            .await
            .unwrap();

        assert_eq!(location(&response), "/certificate?courseId=c1");
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_download_without_pdf_engine_reports_notice() {
        let app = app(seeded().await).await;

        let response = app
            .oneshot(signed_in("/certificate/download?courseId=c1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(location(&response), "/certificate?courseId=c1&notice=pdf_unavailable");
    }

    #[tokio::test]
    async fn test_share_link_points_at_verification_page() {
        let backend = seeded().await;
        let app = app(backend.clone()).await;

        let response = app
            .oneshot(signed_in("/api/certificate/share?courseId=c1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payload: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let issued = backend.enrollment("e1").await.unwrap().certificate_id.unwrap();
        assert_eq!(payload["title"], "BYAMN Certificate");
        assert_eq!(
            payload["url"],
            format!("https://learn.example.com/verification.html?certId={}", issued)
        );
    }

    #[tokio::test]
    async fn test_loaded_course_cards_are_keyboard_accessible() {
        let courses = (1..=8).map(|i| course(&format!("c{}", i), &format!("Course {}", i))).collect();
        let backend = Arc::new(MemoryBackend::with_records(courses, Vec::new()).await);
        let app = app(backend).await;

        let response = app
            .oneshot(Request::builder().uri("/api/courses/cards?offset=6").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let html = body_text(response).await;
        assert_eq!(html.matches("tabindex=\"0\"").count(), 2);
        assert!(html.contains("aria-label=\"View course: Course 7\""));
        assert!(html.contains("data-activate-href=\"player.html?courseId=c8\""));
    }

    #[tokio::test]
    async fn test_courses_page_has_skip_link() {
        let backend = Arc::new(MemoryBackend::with_records(vec![course("c1", "Rust")], Vec::new()).await);
        let app = app(backend).await;

        let response = app
            .oneshot(Request::builder().uri("/courses").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let html = body_text(response).await;
        assert!(html.contains("Skip to main content"));
        assert!(html.contains("id=\"main-content\""));
        assert!(html.contains("View course: Rust"));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_prompt_available() {
        let backend = seeded().await;
        backend.set_fail_writes(true);
        let app = app(backend.clone()).await;

        let response = app
            .clone()
            .oneshot(post_form("/certificate/name", "course_id=c1&enrollment_id=e1&name=Jane"))
            .await
            .unwrap();

        assert_eq!(location(&response), "/certificate?courseId=c1&notice=name_save_failed");
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let reloaded = app
            .oneshot(
                signed_in("/certificate?courseId=c1&notice=name_save_failed")
                    .header(header::COOKIE, "certificateNameAsked_e1=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let html = body_text(reloaded).await;
        assert!(html.contains("id=\"certificate-name-modal\""));
        assert!(html.contains("Error saving certificate name"));
    }

    #[tokio::test]
    async fn test_share_link_refuses_unstored_id() {
        let backend = seeded().await;
        backend.set_fail_writes(true);
        let app = app(backend.clone()).await;

        let response = app
            .oneshot(signed_in("/api/certificate/share?courseId=c1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let payload: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(payload["success"], false);
        assert!(payload["error"]
            .as_str()
            .unwrap_or_default()
            .starts_with("Error saving certificate data"));
        assert!(backend.enrollment("e1").await.unwrap().certificate_id.is_none());
    }
}
