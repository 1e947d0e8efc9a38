//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
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
/// - CORS (allow any origin/method/headers); tighten for production
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/speaking-exercises", get(http::http_list_exercises))
        .route("/api/v1/speaking-exercises/:id", get(http::http_get_exercise))
        .route("/api/v1/speaking-exercises/:id/attempt", post(http::http_post_attempt))
        .route("/api/v1/speaking/score", post(http::http_post_score))
        .route("/api/v1/speaking/evaluate", post(http::http_post_evaluate))
        .route("/api/v1/users/:id/stats", get(http::http_get_stats))
        .route("/api/v1/leaderboard", get(http::http_get_leaderboard))
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
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::TrainerConfig;

    fn app() -> Router {
        build_router(Arc::new(AppState::from_parts(TrainerConfig::default(), None, "demo".into())))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_grader_state() {
        let (status, body) = send(app(), Request::get("/api/v1/health").body(Body::empty()).expect("req")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "grader": false }));
    }

    #[tokio::test]
    async fn stateless_score_matches_reference_scenario() {
        let req = post_json(
            "/api/v1/speaking/score",
            json!({
                "exercise": { "targetWords": ["hobby", "enjoy"], "minDurationSeconds": 30 },
                "attempt": { "transcription": "My hobby is painting and I really enjoy it", "spokenDurationSeconds": 40 }
            }),
        );
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["finalScore"], 78);
        assert_eq!(body["pointsEarned"], 62);
        assert_eq!(body["completed"], true);
        assert_eq!(body["feedback"]["targetWordScore"], 100);
        assert_eq!(body["feedback"]["grammarScore"], 70.0);
        assert_eq!(body["feedback"]["suggestions"], json!(["Great job!"]));
        assert_eq!(body["feedback"]["areasForImprovement"], json!([]));
    }

    #[tokio::test]
    async fn attempt_round_trip_updates_stats() {
        let app = app();
        let req = post_json(
            "/api/v1/speaking-exercises/introduce-yourself/attempt",
            json!({ "userId": "ana", "transcription": "name from work study hobby enjoy like", "duration": 40 }),
        );
        let (status, body) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 78);
        assert_eq!(body["pointsEarned"], 62);
        assert_eq!(body["attempt"]["userId"], "ana");
        assert_eq!(body["progress"]["totalPoints"], 62);

        let (status, stats) = send(app.clone(), Request::get("/api/v1/users/ana/stats").body(Body::empty()).expect("req")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalAttempts"], 1);
        assert_eq!(stats["accuracy"], 100);
        assert_eq!(stats["leaderboardPosition"], 1);

        let (_, detail) = send(
            app,
            Request::get("/api/v1/speaking-exercises/introduce-yourself?userId=ana").body(Body::empty()).expect("req"),
        )
        .await;
        assert_eq!(detail["attempts"].as_array().map(Vec::len), Some(1));
        assert_eq!(detail["exercise"]["minDuration"], 30);
    }

    #[tokio::test]
    async fn unknown_exercise_is_404() {
        let req = post_json("/api/v1/speaking-exercises/missing/attempt", json!({ "duration": 10 }));
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Exercise not found: missing");
    }

    #[tokio::test]
    async fn malformed_attempt_bodies_are_400_json() {
        for duration in [json!("abc"), json!(-5), json!(40.5)] {
            let req = post_json(
                "/api/v1/speaking-exercises/introduce-yourself/attempt",
                json!({ "transcription": "hobby", "duration": duration }),
            );
            let (status, body) = send(app(), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "duration {}", duration);
            assert!(body["error"].is_string(), "duration {}", duration);
        }

        let req = Request::post("/api/v1/speaking-exercises/introduce-yourself/attempt")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn string_duration_from_form_clients_is_accepted() {
        let req = post_json(
            "/api/v1/speaking-exercises/introduce-yourself/attempt",
            json!({ "transcription": "hobby", "duration": "40" }),
        );
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attempt"]["duration"], 40);
        assert_eq!(body["feedback"]["durationMet"], true);
    }

    #[tokio::test]
    async fn malformed_score_body_is_400_json() {
        let req = post_json("/api/v1/speaking/score", json!({ "exercise": { "targetWords": "hobby" } }));
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn evaluate_checks_required_fields_and_falls_back_locally() {
        let (status, body) = send(app(), post_json("/api/v1/speaking/evaluate", json!({ "userResponse": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "userResponse and correctAnswer are required");

        let req = post_json(
            "/api/v1/speaking/evaluate",
            json!({ "userResponse": "I think so", "correctAnswer": "I think so", "exerciseType": "pronunciation" }),
        );
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["evaluation"]["score"], 100);
        assert_eq!(body["evaluation"]["isCorrect"], true);
        assert_eq!(body["evaluation"]["pronunciationErrors"], json!([]));
    }

    #[tokio::test]
    async fn unknown_user_stats_leave_leaderboard_alone() {
        let app = app();
        let (status, stats) =
            send(app.clone(), Request::get("/api/v1/users/nobody/stats").body(Body::empty()).expect("req")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["user"]["level"], 1);
        let (_, board) = send(app, Request::get("/api/v1/leaderboard").body(Body::empty()).expect("req")).await;
        assert_eq!(board.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn listing_defaults_to_demo_user() {
        let (status, body) = send(app(), Request::get("/api/v1/speaking-exercises").body(Body::empty()).expect("req")).await;
        assert_eq!(status, StatusCode::OK);
        let list = body["exercises"].as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], "introduce-yourself");
        assert_eq!(list[0]["attemptCount"], 0);
        assert_eq!(list[0]["latestAttempt"], Value::Null);
    }
}
