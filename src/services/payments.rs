use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{GatewayConfig, ServerConfig};
use crate::db::models::{PaymentStatus, Reservation, ServiceOffering};
use crate::error::{AppError, AppResult};

/// Client for the payment gateway's checkout and payment APIs.
///
/// Checkout preferences carry the reservation id as `external_reference`,
/// which is how asynchronous payment notifications are correlated back to
/// the hold they pay for.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    client: Client,
    api_url: String,
    access_token: String,
}

// ============================================================================
// Checkout Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreatePreferenceRequest {
    items: Vec<PreferenceItem>,
    payer: PreferencePayer,
    external_reference: String,
    back_urls: BackUrls,
    notification_url: String,
}

#[derive(Debug, Serialize)]
struct PreferenceItem {
    title: String,
    quantity: i32,
    unit_price: f64,
    currency_id: String,
}

#[derive(Debug, Serialize)]
struct PreferencePayer {
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    pending: String,
    failure: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

/// A checkout the client is redirected to.
#[derive(Debug, Clone)]
pub struct CheckoutPreference {
    pub id: String,
    pub redirect_url: String,
}

// ============================================================================
// Payment Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GatewayPayment {
    pub id: serde_json::Value,
    pub status: String,
    pub external_reference: Option<String>,
}

impl GatewayPayment {
    /// Collapse the gateway's status vocabulary onto ours.
    pub fn payment_status(&self) -> PaymentStatus {
        match self.status.as_str() {
            "approved" => PaymentStatus::Approved,
            "pending" | "in_process" | "authorized" => PaymentStatus::Pending,
            _ => PaymentStatus::Failed,
        }
    }
}

impl PaymentGateway {
    /// Build the client when an access token is configured; `None`
    /// deployments serve free services only.
    pub fn from_config(config: &GatewayConfig) -> AppResult<Option<Self>> {
        let Some(access_token) = config.access_token.clone() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Some(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token,
        }))
    }

    /// Create a checkout preference for a hold and return the redirect URL.
    pub async fn create_checkout(
        &self,
        reservation: &Reservation,
        service: &ServiceOffering,
        server: &ServerConfig,
    ) -> AppResult<CheckoutPreference> {
        let request = CreatePreferenceRequest {
            items: vec![PreferenceItem {
                title: service.name.clone(),
                quantity: 1,
                unit_price: service.price_cents as f64 / 100.0,
                currency_id: service.currency.clone(),
            }],
            payer: PreferencePayer {
                name: reservation.client_name.clone(),
                email: reservation.client_email.clone(),
            },
            external_reference: reservation.id.clone(),
            back_urls: BackUrls {
                success: format!("{}/booking/success", server.frontend_url),
                pending: format!("{}/booking/pending", server.frontend_url),
                failure: format!("{}/booking/failure", server.frontend_url),
            },
            notification_url: format!("{}/webhooks/payments", server.public_url),
        };

        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.api_url))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "Checkout creation failed ({}): {}",
                status, body
            )));
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid checkout response: {}", e)))?;

        Ok(CheckoutPreference {
            id: preference.id,
            redirect_url: preference.init_point,
        })
    }

    /// Look up a payment reported by a webhook notification.
    pub async fn query_payment(&self, payment_id: &str) -> AppResult<GatewayPayment> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{}", self.api_url, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "Payment lookup failed ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid payment response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(status: &str) -> GatewayPayment {
        GatewayPayment {
            id: serde_json::json!(123),
            status: status.to_string(),
            external_reference: Some("res-1".to_string()),
        }
    }

    #[test]
    fn gateway_statuses_map_onto_ours() {
        assert_eq!(payment("approved").payment_status(), PaymentStatus::Approved);
        assert_eq!(payment("pending").payment_status(), PaymentStatus::Pending);
        assert_eq!(payment("in_process").payment_status(), PaymentStatus::Pending);
        assert_eq!(payment("authorized").payment_status(), PaymentStatus::Pending);
        assert_eq!(payment("rejected").payment_status(), PaymentStatus::Failed);
        assert_eq!(payment("cancelled").payment_status(), PaymentStatus::Failed);
    }

    #[test]
    fn missing_access_token_disables_the_gateway() {
        let config = GatewayConfig {
            access_token: None,
            api_url: "https://api.mercadopago.com".to_string(),
            webhook_secret: None,
        };
        assert!(PaymentGateway::from_config(&config).unwrap().is_none());
    }
}
