//! REST API handlers for the trigger server
//!
//! Every trigger answers a structured JSON body. A 200 does not mean every
//! user got mail: callers must inspect `result.failed` / `result.errors`
//! for partial failures. A 500 with `missingVars` means the service is not
//! configured and nothing was attempted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::models::DeliveryAttempt;
use crate::scheduler::{BatchReport, BatchRequest, SchedulerError, TestSendReport};

// ============================================================================
// API Request Types
// ============================================================================

/// Body of `POST /send-scheduled`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendScheduledRequest {
    /// "HH:MM" window override; users are compared against this time
    pub time: Option<String>,

    /// Send to every candidate regardless of their send time
    pub force_all: bool,
}

/// Body of `POST /test-trigger`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestTriggerRequest {
    /// "test" (single ad-hoc send) or "real" (filtered batch)
    pub mode: Option<String>,

    /// Recipient of a test-mode send
    pub test_email: Option<String>,

    /// Batch filter for real mode: "all", "morning", "random", "specific"
    pub option: Option<String>,

    /// Specific highlight for a test-mode send
    pub highlight_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Successful batch response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<FixedOffset>,
    pub result: BatchReport,
}

/// Successful single-send response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSendResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<FixedOffset>,
    pub data: TestSendReport,
}

/// Structured error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_vars: Option<Vec<String>>,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Environment check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentResponse {
    pub is_valid: bool,
    pub missing: Vec<String>,
    pub present: Vec<String>,
}

/// Recent-logs response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub success: bool,
    pub user_id: String,
    pub logs: Vec<DeliveryAttempt>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and configuration
        .route("/api/health", get(health_check))
        .route("/check-environment", get(check_environment))
        // Scheduled delivery triggers
        .route("/send-scheduled", post(send_scheduled))
        .route("/cron/daily", get(cron_daily).post(cron_daily))
        .route("/cron/test", get(cron_test))
        // Operator triggers
        .route("/test-trigger", get(test_trigger).post(test_trigger))
        // Audit inspection
        .route("/logs/{user_id}", get(recent_logs))
        .with_state(state)
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Refuse to run a trigger while required configuration is missing
fn config_gate(state: &AppState) -> Option<Response> {
    if state.env.is_valid() {
        return None;
    }

    tracing::error!(
        missing = ?state.env.missing,
        "refusing trigger: required environment variables are missing"
    );

    Some(
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                success: false,
                error: "server configuration error: missing environment variables".to_string(),
                timestamp: state.clock.now(),
                missing_vars: Some(state.env.missing.clone()),
            }),
        )
            .into_response(),
    )
}

fn scheduler_error_response(state: &AppState, error: &SchedulerError) -> Response {
    let status = match error {
        SchedulerError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
            timestamp: state.clock.now(),
            missing_vars: None,
        }),
    )
        .into_response()
}

async fn run_batch(state: &AppState, request: BatchRequest, message: &str) -> Response {
    match state.scheduler.run(&request).await {
        Ok(report) => (
            StatusCode::OK,
            Json(BatchResponse {
                success: true,
                message: message.to_string(),
                timestamp: report.timestamp,
                result: report,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "delivery batch failed");
            scheduler_error_response(state, &e)
        }
    }
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Report which required environment variables are missing
async fn check_environment(State(state): State<AppState>) -> impl IntoResponse {
    Json(EnvironmentResponse {
        is_valid: state.env.is_valid(),
        missing: state.env.missing.clone(),
        present: state.env.present.clone(),
    })
}

// ============================================================================
// Trigger Handlers
// ============================================================================

/// Run a batch for the current (or overridden) window
async fn send_scheduled(
    State(state): State<AppState>,
    body: Option<Json<SendScheduledRequest>>,
) -> Response {
    if let Some(rejection) = config_gate(&state) {
        return rejection;
    }

    let req = body.map(|Json(b)| b).unwrap_or_default();
    let request = BatchRequest {
        target_time: req.time,
        force_all: req.force_all,
        ..Default::default()
    };

    run_batch(&state, request, "emails processed").await
}

/// Fixed daily trigger: process the configured morning cohort
async fn cron_daily(State(state): State<AppState>) -> Response {
    if let Some(rejection) = config_gate(&state) {
        return rejection;
    }

    let daily = state.config.delivery.daily_send_time.clone();
    tracing::info!(target_time = %daily, "daily cron trigger");

    run_batch(
        &state,
        BatchRequest::at_time(daily),
        "daily email processing completed",
    )
    .await
}

/// Connectivity test: one email to the configured test recipient
async fn cron_test(State(state): State<AppState>) -> Response {
    if let Some(rejection) = config_gate(&state) {
        return rejection;
    }

    let Some(recipient) = state.config.delivery.test_recipient.clone() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                success: false,
                error: "no test recipient configured (set DAYBREAK_TEST_RECIPIENT)".to_string(),
                timestamp: state.clock.now(),
                missing_vars: None,
            }),
        )
            .into_response();
    };

    match state.scheduler.run_connectivity_test(&recipient).await {
        Ok(report) => (
            StatusCode::OK,
            Json(TestSendResponse {
                success: true,
                message: format!("test email sent to {recipient}"),
                timestamp: report.sent_at,
                data: report,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "connectivity test failed");
            scheduler_error_response(&state, &e)
        }
    }
}

/// Operator trigger: ad-hoc single sends and filtered batch runs
async fn test_trigger(
    State(state): State<AppState>,
    body: Option<Json<TestTriggerRequest>>,
) -> Response {
    if let Some(rejection) = config_gate(&state) {
        return rejection;
    }

    let req = body.map(|Json(b)| b).unwrap_or_default();
    let mode = req.mode.as_deref().unwrap_or("test");

    if mode == "test" {
        if let Some(test_email) = req.test_email.as_deref() {
            return match state
                .scheduler
                .run_test_send(test_email, req.highlight_id.as_deref())
                .await
            {
                Ok(report) => (
                    StatusCode::OK,
                    Json(TestSendResponse {
                        success: true,
                        message: format!("test highlight sent to {test_email}"),
                        timestamp: report.sent_at,
                        data: report,
                    }),
                )
                    .into_response(),
                Err(e) => {
                    tracing::error!(error = %e, "test send failed");
                    scheduler_error_response(&state, &e)
                }
            };
        }
        // Test mode without a recipient falls through to a batch run
    }

    let request = match req.option.as_deref() {
        Some("random") => BatchRequest {
            only_random: true,
            ..Default::default()
        },
        Some("specific") => BatchRequest {
            only_specific: true,
            ..Default::default()
        },
        // "all", "morning" and anything else target the daily cohort
        _ => BatchRequest::at_time(state.config.delivery.daily_send_time.clone()),
    };

    let option = req.option.unwrap_or_else(|| "all".to_string());
    run_batch(&state, request, &format!("trigger completed ({option})")).await
}

// ============================================================================
// Audit Handlers
// ============================================================================

/// Recent delivery attempts for one user, newest first
async fn recent_logs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Response {
    if let Some(rejection) = config_gate(&state) {
        return rejection;
    }

    let limit = query.limit.unwrap_or(10).min(100);

    match state.audit.recent_for_user(&user_id, limit).await {
        Ok(logs) => (
            StatusCode::OK,
            Json(LogsResponse {
                success: true,
                user_id,
                logs,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "failed to read delivery logs");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    error: e.to_string(),
                    timestamp: state.clock.now(),
                    missing_vars: None,
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::{AppConfig, EnvReport};
    use crate::mailer::{CaptureMailer, EmailComposer};
    use crate::models::{DeliveryCandidate, HighlightRecord};
    use crate::scheduler::DeliveryScheduler;
    use crate::selector::HighlightSelector;
    use crate::store::{AttemptLog, MemoryAttemptLog, MemoryDirectory, MemoryHighlightStore};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Instant;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        mailer: Arc<CaptureMailer>,
    }

    fn app_with(env: EnvReport, candidates: Vec<DeliveryCandidate>) -> TestApp {
        let highlights = Arc::new(MemoryHighlightStore::new());
        for candidate in &candidates {
            highlights.insert(
                candidate.user_id.clone(),
                HighlightRecord::new(format!("hl-{}", candidate.user_id), "stored text"),
            );
        }

        let mailer = Arc::new(CaptureMailer::new());
        let audit: Arc<dyn AttemptLog> = Arc::new(MemoryAttemptLog::new());
        let clock = Clock::default();

        let scheduler = Arc::new(DeliveryScheduler::new(
            clock,
            Arc::new(MemoryDirectory::new(candidates)),
            HighlightSelector::new(highlights),
            mailer.clone(),
            audit.clone(),
            EmailComposer::new("https://daybreak.app"),
        ));

        let mut config = AppConfig::default();
        config.delivery.test_recipient = Some("ops@example.com".to_string());

        let state = AppState {
            scheduler,
            audit,
            clock,
            config,
            env: Arc::new(env),
            start_time: Instant::now(),
        };

        TestApp {
            router: create_router(state),
            mailer,
        }
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_scheduled_refuses_without_configuration() {
        let env = EnvReport {
            missing: vec!["MAIL_API_KEY".to_string(), "STORE_URL".to_string()],
            present: vec![],
        };
        let app = app_with(env, vec![]);

        let (status, json) = call(
            app.router,
            json_post("/send-scheduled", serde_json::json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        let missing: Vec<&str> = json["missingVars"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(missing, vec!["MAIL_API_KEY", "STORE_URL"]);
        assert_eq!(app.mailer.count(), 0);
    }

    #[tokio::test]
    async fn test_send_scheduled_empty_batch_succeeds() {
        let app = app_with(EnvReport::valid(), vec![]);

        let (status, json) = call(
            app.router,
            json_post("/send-scheduled", serde_json::json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["total"], 0);
        assert_eq!(json["result"]["sent"], 0);
    }

    #[tokio::test]
    async fn test_send_scheduled_force_all_delivers() {
        let candidate =
            DeliveryCandidate::new("u1", "u1@example.com").with_send_time("23:00");
        let app = app_with(EnvReport::valid(), vec![candidate]);

        let (status, json) = call(
            app.router,
            json_post("/send-scheduled", serde_json::json!({"forceAll": true})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"]["sent"], 1);
        assert_eq!(app.mailer.count(), 1);
    }

    #[tokio::test]
    async fn test_send_scheduled_rejects_malformed_time() {
        let app = app_with(EnvReport::valid(), vec![]);

        let (status, json) = call(
            app.router,
            json_post("/send-scheduled", serde_json::json!({"time": "six"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("HH:MM"));
    }

    #[tokio::test]
    async fn test_cron_daily_targets_morning_cohort() {
        let morning = DeliveryCandidate::new("u1", "u1@example.com").with_send_time("06:00");
        let evening = DeliveryCandidate::new("u2", "u2@example.com").with_send_time("21:00");
        let app = app_with(EnvReport::valid(), vec![morning, evening]);

        let request = Request::builder()
            .method("GET")
            .uri("/cron/daily")
            .body(Body::empty())
            .unwrap();
        let (status, json) = call(app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"]["sent"], 1);
        assert_eq!(json["result"]["skipped"], 1);
        assert_eq!(app.mailer.sent()[0].to, "u1@example.com");
    }

    #[tokio::test]
    async fn test_cron_test_sends_to_configured_recipient() {
        let app = app_with(EnvReport::valid(), vec![]);

        let request = Request::builder()
            .method("GET")
            .uri("/cron/test")
            .body(Body::empty())
            .unwrap();
        let (status, json) = call(app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["to"], "ops@example.com");
        assert_eq!(app.mailer.count(), 1);
    }

    #[tokio::test]
    async fn test_test_trigger_single_send() {
        let app = app_with(EnvReport::valid(), vec![]);

        let (status, json) = call(
            app.router,
            json_post(
                "/test-trigger",
                serde_json::json!({"mode": "test", "testEmail": "probe@example.com"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["to"], "probe@example.com");
        // Empty store falls back to the sample highlight
        assert_eq!(json["data"]["highlightId"], "sample");
        assert_eq!(app.mailer.count(), 1);
    }

    #[tokio::test]
    async fn test_test_trigger_real_mode_random_filter() {
        let random = DeliveryCandidate::new("u1", "u1@example.com").with_send_time("06:00");
        let specific = DeliveryCandidate::new("u2", "u2@example.com")
            .with_send_time("06:00")
            .with_pinned_highlight("hl-u2");
        let app = app_with(EnvReport::valid(), vec![random, specific]);

        let (status, json) = call(
            app.router,
            json_post(
                "/test-trigger",
                serde_json::json!({"mode": "real", "option": "random"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        // The specific-mode user is skipped for their mode, never failed
        let details = json["result"]["userDetails"].as_array().unwrap();
        let specific_user = details.iter().find(|d| d["userId"] == "u2").unwrap();
        assert_eq!(specific_user["status"], "skipped");
        assert!(specific_user["reason"]
            .as_str()
            .unwrap()
            .contains("not a random-mode user"));
        assert_eq!(json["result"]["failed"], 0);
    }

    #[tokio::test]
    async fn test_health_and_environment_endpoints() {
        let env = EnvReport {
            missing: vec!["STORE_ANON_KEY".to_string()],
            present: vec!["MAIL_API_KEY".to_string()],
        };
        let app = app_with(env, vec![]);

        let request = Request::builder()
            .method("GET")
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = call(app.router.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");

        let request = Request::builder()
            .method("GET")
            .uri("/check-environment")
            .body(Body::empty())
            .unwrap();
        let (status, json) = call(app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["isValid"], false);
        assert_eq!(json["missing"][0], "STORE_ANON_KEY");
        assert_eq!(json["present"][0], "MAIL_API_KEY");
    }

    #[tokio::test]
    async fn test_recent_logs_after_delivery() {
        let candidate = DeliveryCandidate::new("u1", "u1@example.com").with_send_time("06:00");
        let app = app_with(EnvReport::valid(), vec![candidate]);

        let (status, _) = call(
            app.router.clone(),
            json_post("/send-scheduled", serde_json::json!({"forceAll": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .method("GET")
            .uri("/logs/u1?limit=5")
            .body(Body::empty())
            .unwrap();
        let (status, json) = call(app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["userId"], "u1");
        let logs = json["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["outcome"], "success");
        assert_eq!(logs[0]["kind"], "scheduled");
    }
}
