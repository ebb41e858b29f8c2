//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers); the API only binds to loopback by default
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    let api = Router::new()
        .route("/health", get(http::http_health))
        // Catalog
        .route("/requirements", get(http::http_list_requirements))
        .route("/requirements/:id", get(http::http_get_requirement))
        .route("/questions", get(http::http_list_questions))
        .route("/topics", get(http::http_list_topics))
        .route("/sections", get(http::http_list_sections))
        .route("/grade-boundaries", get(http::http_grade_boundaries))
        // Progress
        .route("/studied/:id", post(http::http_toggle_studied))
        .route("/dashboard", get(http::http_dashboard))
        .route("/tracker", get(http::http_tracker))
        .route("/attempts", get(http::http_attempts))
        // Exam
        .route("/exam", get(http::http_exam_status))
        .route("/exam/start", post(http::http_exam_start))
        .route("/exam/answer", post(http::http_exam_answer))
        .route("/exam/next", post(http::http_exam_next))
        .route("/exam/exit", post(http::http_exam_exit))
        .route("/exam/review", get(http::http_exam_review))
        // Portfolio
        .route(
            "/portfolio",
            get(http::http_list_documents).post(http::http_create_document),
        )
        .route(
            "/portfolio/:id",
            get(http::http_get_document).delete(http::http_delete_document),
        )
        .route("/portfolio/:id/title", put(http::http_set_title))
        .route("/portfolio/:id/sections/:section", put(http::http_set_section))
        .route(
            "/portfolio/:id/sections/:section/assist",
            post(http::http_draft_assist),
        )
        .route("/tag", post(http::http_tag))
        // Tutor
        .route("/tutor", get(http::http_transcript))
        .route("/tutor/message", post(http::http_tutor_message))
        .route("/tutor/clear", post(http::http_tutor_clear))
        // Settings
        .route("/settings", get(http::http_settings))
        .route("/settings/credential", put(http::http_set_credential))
        .route("/settings/reset", post(http::http_reset));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::tests::{state_with, FakeProvider};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn app(provider: FakeProvider) -> Router {
        let (_, state) = state_with(provider);
        build_router(state)
    }

    #[tokio::test]
    async fn health_and_catalog() {
        let app = app(FakeProvider::default());
        let (s, v) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["ok"], true);

        let (_, v) = call(&app, "GET", "/api/v1/requirements?category=behaviour", None).await;
        let list = v.as_array().unwrap();
        assert_eq!(list.len(), 7);
        assert!(list.iter().all(|r| r["category"] == "behaviour" && r["status"] == "pending"));

        let (s, _) = call(&app, "GET", "/api/v1/requirements/X1", None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);

        let (_, v) = call(&app, "GET", "/api/v1/topics", None).await;
        assert_eq!(v, json!(["K1", "K2", "K3", "K4"]));

        let (_, v) = call(&app, "GET", "/api/v1/grade-boundaries", None).await;
        assert_eq!(v["pass"], 60.0);
    }

    #[tokio::test]
    async fn studied_toggle_shows_on_dashboard() {
        let app = app(FakeProvider::default());
        let (_, v) = call(&app, "POST", "/api/v1/studied/K1", None).await;
        assert_eq!(v, json!({ "id": "K1", "studied": true }));
        let (_, v) = call(&app, "GET", "/api/v1/dashboard", None).await;
        assert_eq!(v["studied"], 1);
        let (_, v) = call(&app, "GET", "/api/v1/requirements/K1", None).await;
        assert_eq!(v["status"], "studied");
    }

    #[tokio::test]
    async fn exam_flow_over_http() {
        let app = app(FakeProvider::default());
        let (s, v) = call(&app, "POST", "/api/v1/exam/start", Some(json!({ "mode": "topic", "topic": "K2" }))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["phase"], "active");
        assert_eq!(v["countdown"], false);
        assert!(v["question"].get("answer").is_none());

        let (s, _) = call(&app, "POST", "/api/v1/exam/next", None).await;
        assert_eq!(s, StatusCode::CONFLICT);

        let total = v["total"].as_u64().unwrap();
        for _ in 0..total {
            let (s, r) = call(&app, "POST", "/api/v1/exam/answer", Some(json!({ "option": "a" }))).await;
            assert_eq!(s, StatusCode::OK);
            assert_eq!(r["chosen"], "a");
            call(&app, "POST", "/api/v1/exam/next", None).await;
        }
        let (_, v) = call(&app, "GET", "/api/v1/exam", None).await;
        assert_eq!(v["phase"], "results");
        let (s, review) = call(&app, "GET", "/api/v1/exam/review", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(review["items"].as_array().unwrap().len() as u64, total);

        let (_, attempts) = call(&app, "GET", "/api/v1/attempts", None).await;
        assert_eq!(attempts[0]["mode"], "topic");
        assert_eq!(attempts[0]["requirements"], json!(["K2"]));
    }

    #[tokio::test]
    async fn portfolio_crud() {
        let app = app(FakeProvider::default());
        let (s, doc) = call(&app, "POST", "/api/v1/portfolio", None).await;
        assert_eq!(s, StatusCode::OK);
        let id = doc["id"].as_i64().unwrap();
        assert_eq!(doc["title"], "");

        let (_, doc) = call(&app, "PUT", &format!("/api/v1/portfolio/{id}/title"), Some(json!({ "title": "Motor Fault" }))).await;
        assert_eq!(doc["title"], "Motor Fault");

        let text = "Applied safe isolation and lock-off before testing; covers S2.";
        let (_, doc) = call(&app, "PUT", &format!("/api/v1/portfolio/{id}/sections/task"), Some(json!({ "text": text }))).await;
        assert_eq!(doc["sections"]["task"], text);
        assert_eq!(doc["sectionsComplete"], 1);
        assert!(doc["detectedRequirements"].as_array().unwrap().contains(&json!("S2")));

        let (s, _) = call(&app, "PUT", &format!("/api/v1/portfolio/{id}/sections/nope"), Some(json!({ "text": "x" }))).await;
        assert_eq!(s, StatusCode::NOT_FOUND);

        let (_, list) = call(&app, "GET", "/api/v1/portfolio", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        let (_, v) = call(&app, "DELETE", &format!("/api/v1/portfolio/{id}"), None).await;
        assert_eq!(v["deleted"], true);
        let (s, _) = call(&app, "GET", &format!("/api/v1/portfolio/{id}"), None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tutor_needs_credential_then_replies() {
        let app = app(FakeProvider { reply: "Use a voltage indicator.".into(), ..Default::default() });
        let (s, v) = call(&app, "POST", "/api/v1/tutor/message", Some(json!({ "text": "How to prove dead?" }))).await;
        assert_eq!(s, StatusCode::PRECONDITION_REQUIRED);
        assert!(v["error"].as_str().unwrap().contains("credential"));

        let (_, v) = call(&app, "PUT", "/api/v1/settings/credential", Some(json!({ "credential": "  k-123  " }))).await;
        assert_eq!(v["credential_configured"], true);
        assert_eq!(v["ai_model"], "fake-model");

        let (s, v) = call(&app, "POST", "/api/v1/tutor/message", Some(json!({ "text": "How to prove dead?" }))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["turns"].as_array().unwrap().len(), 3);
        assert_eq!(v["turns"][2]["text"], "Use a voltage indicator.");
        assert_eq!(v["busy"], false);

        let (_, v) = call(&app, "POST", "/api/v1/tutor/clear", None).await;
        assert_eq!(v["turns"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn provider_error_maps_to_bad_gateway() {
        let app = app(FakeProvider { fail: Some("API key not valid".into()), ..Default::default() });
        call(&app, "PUT", "/api/v1/settings/credential", Some(json!({ "credential": "bad" }))).await;
        let (_, doc) = call(&app, "POST", "/api/v1/portfolio", None).await;
        let id = doc["id"].as_i64().unwrap();
        let (s, v) = call(&app, "POST", &format!("/api/v1/portfolio/{id}/sections/intro/assist"), None).await;
        assert_eq!(s, StatusCode::BAD_GATEWAY);
        assert_eq!(v["error"], "API key not valid");
    }

    #[tokio::test]
    async fn reset_wipes_progress() {
        let app = app(FakeProvider::default());
        call(&app, "POST", "/api/v1/studied/S1", None).await;
        call(&app, "POST", "/api/v1/portfolio", None).await;
        let (s, _) = call(&app, "POST", "/api/v1/settings/reset", None).await;
        assert_eq!(s, StatusCode::OK);
        let (_, v) = call(&app, "GET", "/api/v1/dashboard", None).await;
        assert_eq!(v["studied"], 0);
        let (_, list) = call(&app, "GET", "/api/v1/portfolio", None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tag_endpoint_returns_codes() {
        let app = app(FakeProvider::default());
        let (_, v) = call(&app, "POST", "/api/v1/tag", Some(json!({ "text": "" }))).await;
        assert_eq!(v["requirements"], json!([]));
        let (_, v) = call(&app, "POST", "/api/v1/tag", Some(json!({ "text": "Evidence for K2 and B1" }))).await;
        assert_eq!(v["requirements"], json!(["K2", "B1"]));
    }
}
