//! Shared fixtures for warden-axum integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use warden_axum::bootstrap::{CorsConfig, ServerConfig, bootstrap};
use warden_axum::routes::create_router;
use warden_axum::state::AppState;
use warden_runtime::SupervisorTimings;

/// Config rooted in `dir`, with short lifecycle delays.
pub fn test_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        port: 0, // Not used in tests
        launch_config_path: dir.join("launch.json"),
        server_dir: Some(dir.to_path_buf()),
        static_dir: None,
        cors: CorsConfig::AllowAll,
        telemetry_interval: Duration::from_millis(50),
        timings: SupervisorTimings {
            stop_timeout: Duration::from_millis(500),
            verify_shutdown_delay: Duration::from_millis(20),
            reinitialize_delay: Duration::from_millis(10),
            readiness_timeout: Duration::from_secs(5),
            readiness_poll: Duration::from_millis(10),
            final_confirmation_delay: Duration::from_millis(20),
        },
    }
}

pub async fn test_app(dir: &Path) -> (Router, AppState) {
    let state = Arc::new(bootstrap(test_config(dir)).await.unwrap());
    let app = create_router(Arc::clone(&state), &CorsConfig::AllowAll);
    (app, state)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    };
    app.clone().oneshot(request.unwrap()).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Poll `/api/server/status` until `state` is reported.
pub async fn wait_for_state(app: &Router, state: &str) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = send(app, "GET", "/api/server/status", None).await;
            assert_eq!(response.status(), StatusCode::OK);
            if json_body(response).await["state"] == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for state {state}");
}
