//! Delivery attempt audit log
//!
//! One append-only record per delivery attempt. Writing the record is
//! best-effort by contract: a failed audit write must never turn an
//! already-sent email into a reported failure, so [`AttemptLog::record`]
//! returns a boolean and keeps errors behind its own boundary.

use std::sync::Arc;

use async_trait::async_trait;

use super::{StoreClient, StoreResult};
use crate::models::DeliveryAttempt;

/// Audit sink for delivery attempts
#[async_trait]
pub trait AttemptLog: Send + Sync {
    /// Persist one attempt record, best-effort
    ///
    /// Returns whether the write succeeded. Never propagates an error.
    async fn record(&self, attempt: &DeliveryAttempt) -> bool;

    /// Most recent attempts for a user, newest first
    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<DeliveryAttempt>>;
}

/// Audit log backed by the store's `delivery_logs` table
pub struct RestAttemptLog {
    client: Arc<StoreClient>,
}

impl RestAttemptLog {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AttemptLog for RestAttemptLog {
    async fn record(&self, attempt: &DeliveryAttempt) -> bool {
        match self.client.insert("delivery_logs", attempt).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    user_id = %attempt.user_id,
                    outcome = attempt.outcome.as_str(),
                    error = %e,
                    "failed to write delivery attempt record"
                );
                false
            }
        }
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<DeliveryAttempt>> {
        let user = format!("eq.{user_id}");
        let limit = limit.to_string();

        self.client
            .select(
                "delivery_logs",
                &[
                    ("user_id", user.as_str()),
                    ("order", "created_at.desc"),
                    ("limit", limit.as_str()),
                ],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptDetail, AttemptKind};
    use crate::store::StoreConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn log_for(server: &MockServer) -> RestAttemptLog {
        RestAttemptLog::new(Arc::new(
            StoreClient::new(
                StoreConfig::new(server.uri())
                    .with_anon_key("anon")
                    .with_service_key("service"),
            )
            .unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_record_returns_true_on_insert() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/delivery_logs"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let log = log_for(&server);
        let attempt = DeliveryAttempt::success(
            "user-1",
            AttemptKind::Scheduled,
            AttemptDetail::default(),
        );

        assert!(log.record(&attempt).await);
    }

    #[tokio::test]
    async fn test_record_swallows_write_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/delivery_logs"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let log = log_for(&server);
        let attempt = DeliveryAttempt::failure(
            "user-1",
            AttemptKind::Test,
            AttemptDetail {
                error: Some("transport rejected".to_string()),
                ..Default::default()
            },
        );

        // Returns false, never an error
        assert!(!log.record(&attempt).await);
    }

    #[tokio::test]
    async fn test_recent_for_user_queries_newest_first() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/delivery_logs"))
            .and(query_param("user_id", "eq.user-1"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "user_id": "user-1",
                    "outcome": "success",
                    "kind": "scheduled",
                    "detail": {"message_id": "em_1"},
                    "created_at": "2024-03-01T06:00:00Z"
                }
            ])))
            .mount(&server)
            .await;

        let log = log_for(&server);
        let attempts = log.recent_for_user("user-1", 10).await.unwrap();

        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].detail.message_id.as_deref(), Some("em_1"));
    }
}
