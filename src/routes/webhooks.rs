use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};

use crate::services::webhooks::{PaymentWebhook, WebhookService, GATEWAY_SIGNATURE_HEADER};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/payments", post(handle_payment_webhook))
}

/// Receiver for asynchronous payment-processor notifications.
///
/// This endpoint always acknowledges with 2xx, whatever happens inside:
/// returning an error would put the gateway into a delivery-retry storm.
/// Failures are logged for manual follow-up instead.
async fn handle_payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if let Some(secret) = &state.config.gateway.webhook_secret {
        let signature = headers
            .get(GATEWAY_SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        match signature {
            None => {
                tracing::warn!("Payment webhook without signature header, ignoring");
                return (StatusCode::OK, "OK");
            }
            Some(signature) => {
                if let Err(e) = WebhookService::verify_signature(secret, &body, signature) {
                    tracing::warn!("Payment webhook signature rejected: {}", e);
                    return (StatusCode::OK, "OK");
                }
            }
        }
    }

    let payload: PaymentWebhook = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed payment webhook payload, ignoring: {}", e);
            return (StatusCode::OK, "OK");
        }
    };

    tracing::info!(
        "Received payment webhook: topic={:?}, action={:?}, id={:?}",
        payload.topic,
        payload.action,
        payload.payment_id()
    );

    if let Err(e) = WebhookService::process(&state, &payload).await {
        tracing::error!(
            "Payment webhook processing failed, flagged for manual follow-up: {}",
            e
        );
    }

    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use crate::services::notifications::NotificationService;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let state = Arc::new(AppState {
            db: test_pool().await,
            config: crate::config::Config::default(),
            gateway: None,
            notifications: NotificationService::disabled(),
        });
        router().with_state(state)
    }

    async fn post_body(app: Router, body: &'static str) -> StatusCode {
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/payments")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        // Drain the body so the connection finishes cleanly.
        let _ = response.into_body().collect().await;
        status
    }

    #[tokio::test]
    async fn acknowledges_valid_payloads() {
        let app = test_app().await;
        let status = post_body(app, r#"{"type":"payment","data":{"id":1}}"#).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn acknowledges_malformed_payloads() {
        let app = test_app().await;
        let status = post_body(app, "this is not json").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn acknowledges_unknown_topics() {
        let app = test_app().await;
        let status = post_body(app, r#"{"type":"merchant_order","data":{"id":7}}"#).await;
        assert_eq!(status, StatusCode::OK);
    }
}
