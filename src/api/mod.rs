//! DevChain REST API
//!
//! HTTP API layer for DevChain, built with Axum.
//!
//! # Endpoints
//!
//! ## Users and session
//! - `POST /api/v1/users` - Register
//! - `GET /api/v1/users/:id` - Fetch a user
//! - `GET /api/v1/users/:id/stats` - Learning stats
//! - `POST|GET|DELETE /api/v1/session` - Sign in, current user, sign out
//!
//! ## Entries
//! - `GET|POST /api/v1/users/:id/entries` - List or submit
//! - `PUT|DELETE /api/v1/users/:id/entries/:entry_id` - Edit or delete
//! - `POST /api/v1/validate/entry` - Validate form fields
//!
//! ## Badges
//! - `GET /api/v1/users/:id/badges` - Catalog and progress
//! - `GET /api/v1/users/:id/badges/eligible` - Claimable badges
//! - `POST /api/v1/users/:id/badges/:milestone/claim` - Claim
//!
//! ## Settings, profile and backup
//! - `GET|PUT /api/v1/users/:id/settings`
//! - `GET|PUT /api/v1/users/:id/profile`
//! - `GET /api/v1/users/:id/backup` - JSON backup
//! - `GET /api/v1/users/:id/export` - CSV export
//! - `POST /api/v1/backup/restore` - Restore a backup
//!
//! ## Ledger and scheduler
//! - `GET /api/v1/ledger/status`
//! - `GET /api/v1/ledger/transactions/:id`
//! - `POST /api/v1/scheduler/run`
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/v1/ws?user_id=...` - Live tracker events for one user

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::events::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api_routes = Router::new()
        // User routes
        .route("/users", post(routes::users::register))
        .route("/users/:id", get(routes::users::get_user))
        .route("/users/:id/stats", get(routes::users::get_stats))
        .route(
            "/session",
            post(routes::users::sign_in)
                .get(routes::users::current_session)
                .delete(routes::users::sign_out),
        )
        // Entry routes
        .route(
            "/users/:id/entries",
            get(routes::entries::list_entries).post(routes::entries::submit_entry),
        )
        .route(
            "/users/:id/entries/:entry_id",
            put(routes::entries::update_entry).delete(routes::entries::delete_entry),
        )
        .route("/validate/entry", post(routes::entries::validate_entry))
        // Badge routes
        .route("/users/:id/badges", get(routes::badges::list_badges))
        .route(
            "/users/:id/badges/eligible",
            get(routes::badges::eligible_badges),
        )
        .route(
            "/users/:id/badges/:milestone/claim",
            post(routes::badges::claim_badge),
        )
        // Settings and profile routes
        .route(
            "/users/:id/settings",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .route(
            "/users/:id/profile",
            get(routes::settings::get_profile).put(routes::settings::update_profile),
        )
        // Backup routes
        .route("/users/:id/backup", get(routes::backup::download_backup))
        .route("/users/:id/export", get(routes::backup::export_csv))
        .route("/backup/restore", post(routes::backup::restore_backup))
        // Ledger routes
        .route("/ledger/status", get(routes::ledger::ledger_status))
        .route(
            "/ledger/transactions/:id",
            get(routes::ledger::verify_transaction),
        )
        // Scheduler routes
        .route("/scheduler/run", post(routes::scheduler::run_now))
        // WebSocket route
        .route("/ws", get(websocket_handler));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Permissive when no origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let pruner = Arc::clone(&state.limiter).spawn_pruner();
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("DevChain API listening on {}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)));
    pruner.abort();
    served?;

    tracing::info!("DevChain API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHub;
    use crate::ledger::LedgerService;
    use crate::notify::LogOnly;
    use crate::storage::MemoryStore;
    use crate::tracker::Tracker;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn test_state(config: ApiConfig) -> AppState {
        let tracker = Tracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LedgerService::disabled()),
            Arc::new(LogOnly),
            None,
            Arc::new(EventHub::default()),
        );
        AppState::new(Arc::new(tracker), config)
    }

    fn create_test_app(config: ApiConfig) -> Router {
        build_router(test_state(config))
    }

    fn app() -> Router {
        create_test_app(ApiConfig::default())
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn register(app: &Router, username: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/users",
                json!({"username": username, "email": format!("{}@example.com", username)}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn entry_body(title: &str) -> Value {
        json!({
            "title": title,
            "description": "Walked through borrowing and lifetimes",
            "category": "tutorial",
            "date": Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        })
    }

    #[tokio::test]
    async fn test_health_live() {
        let response = app().oneshot(get("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let response = app().oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["ledger"], "disabled");
        assert_eq!(body["scheduler"], "disabled");
    }

    #[tokio::test]
    async fn test_register_and_fetch_user() {
        let app = app();
        let id = register(&app, "ada").await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/users/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["username"], "ada");

        let response = app.oneshot(get("/api/v1/session")).await.unwrap();
        assert_eq!(body_json(response).await["user"]["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let app = app();
        register(&app, "ada").await;

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/v1/users",
                json!({"username": "ada2", "email": "ADA@example.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let response = app()
            .oneshot(get("/api/v1/users/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_submit_entry_unlocks_first_badge() {
        let app = app();
        let id = register(&app, "ada").await;

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/api/v1/users/{}/entries", id),
                entry_body("Learned Rust ownership"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["user"]["totalEntries"], 1);
        assert_eq!(body["unlocked"][0]["milestone"], 1);
        assert!(body["ledger"].is_null());

        let response = app
            .oneshot(get(&format!("/api/v1/users/{}/entries", id)))
            .await
            .unwrap();
        let entries = body_json(response).await;
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["title"], "Learned Rust ownership");
    }

    #[tokio::test]
    async fn test_invalid_entry_returns_field_errors() {
        let app = app();
        let id = register(&app, "ada").await;

        let response = app
            .oneshot(json_request(
                Method::POST,
                &format!("/api/v1/users/{}/entries", id),
                entry_body("ab"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["fields"]["title"].is_string());
    }

    #[tokio::test]
    async fn test_entry_writes_are_rate_limited() {
        let app = create_test_app(ApiConfig {
            rate_limit_requests: 2,
            ..ApiConfig::default()
        });
        let id = register(&app, "ada").await;
        let uri = format!("/api/v1/users/{}/entries", id);

        for title in ["First entry", "Second entry"] {
            let response = app
                .clone()
                .oneshot(json_request(Method::POST, &uri, entry_body(title)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(json_request(Method::POST, &uri, entry_body("Third entry")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        // Reads are not limited
        let response = app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_users_take_no_rate_limit_slot() {
        let state = test_state(ApiConfig::default());
        let limiter = Arc::clone(&state.limiter);
        let app = build_router(state);

        for i in 0..50 {
            let uri = format!("/api/v1/users/ghost-{}/entries", i);
            let response = app
                .clone()
                .oneshot(json_request(Method::POST, &uri, entry_body("Phantom entry")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(limiter.tracked_keys(), 0);

        let id = register(&app, "ada").await;
        let uri = format!("/api/v1/users/{}/entries", id);
        let response = app
            .oneshot(json_request(Method::POST, &uri, entry_body("Real entry")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn test_validate_entry_endpoint() {
        let response = app()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/validate/entry",
                json!({"title": "ok", "description": "", "category": "tutorial", "date": "2026-01-01"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["valid"], false);
        assert!(body["errors"]["title"].is_string());
        assert!(body["errors"]["description"].is_string());
        assert!(body["errors"]["category"].is_null());
    }

    #[tokio::test]
    async fn test_backup_download_and_restore() {
        let app = app();
        let id = register(&app, "ada").await;
        let entries_uri = format!("/api/v1/users/{}/entries", id);
        app.clone()
            .oneshot(json_request(
                Method::POST,
                &entries_uri,
                entry_body("Learned Rust ownership"),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/users/{}/backup", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("devchain-backup-"));
        let backup = body_text(response).await;

        // Wipe the entry, then restore it from the file
        let listed = body_json(app.clone().oneshot(get(&entries_uri)).await.unwrap()).await;
        let entry_id = listed[0]["id"].as_str().unwrap().to_string();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri(format!("{}/{}", entries_uri, entry_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/backup/restore")
                    .body(Body::from(backup))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["entries"], 1);

        let listed = body_json(app.oneshot(get(&entries_uri)).await.unwrap()).await;
        assert_eq!(listed[0]["id"], entry_id.as_str());
    }

    #[tokio::test]
    async fn test_restore_rejects_bundle_without_version() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/backup/restore")
                    .body(Body::from(r#"{"user": {"id": "u1"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_BACKUP");
    }

    #[tokio::test]
    async fn test_csv_export() {
        let app = app();
        let id = register(&app, "ada").await;
        app.clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/api/v1/users/{}/entries", id),
                entry_body("Learned Rust ownership"),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(get(&format!("/api/v1/users/{}/export", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");

        let csv = body_text(response).await;
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("Learned Rust ownership"));
    }

    #[tokio::test]
    async fn test_ledger_status_and_verify_disabled() {
        let app = app();
        let response = app
            .clone()
            .oneshot(get("/api/v1/ledger/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["enabled"], false);

        let response = app
            .oneshot(get("/api/v1/ledger/transactions/0.0.1234@1700000000.000000001"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_scheduler_run_without_scheduler() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/scheduler/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
