use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::db::models::PaymentStatus;
use crate::db::{AppointmentRepository, ReservationRepository};
use crate::error::{AppError, AppResult};
use crate::services::finalize::FinalizeService;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const GATEWAY_SIGNATURE_HEADER: &str = "x-gateway-signature";

const TOPIC_PAYMENT: &str = "payment";

/// Asynchronous payment notification: a correlation id plus a topic. The
/// payload itself carries no trusted state; the payment is always looked up
/// at the gateway before anything changes.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub action: Option<String>,
    #[serde(rename = "type")]
    pub topic: Option<String>,
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    /// Gateways send this as either a JSON string or a number.
    pub id: Option<serde_json::Value>,
}

impl PaymentWebhook {
    pub fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some(TOPIC_PAYMENT)
            || self
                .action
                .as_deref()
                .is_some_and(|a| a.starts_with("payment."))
    }

    pub fn payment_id(&self) -> Option<String> {
        self.data.as_ref()?.id.as_ref().and_then(id_string)
    }
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct WebhookService;

impl WebhookService {
    /// Verify the `sha256=<hex>` HMAC signature over the raw request body.
    pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> AppResult<()> {
        let Some(hex_sig) = signature.strip_prefix("sha256=") else {
            return Err(AppError::BadRequest("Invalid signature format".to_string()));
        };
        let expected = hex::decode(hex_sig)
            .map_err(|_| AppError::BadRequest("Invalid signature format".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to create HMAC")))?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| AppError::BadRequest("Signature mismatch".to_string()))
    }

    /// Correlate a payment notification back to its reservation and apply
    /// the reported status. Errors here are the caller's to swallow: the
    /// webhook endpoint always acknowledges receipt.
    pub async fn process(state: &AppState, payload: &PaymentWebhook) -> AppResult<()> {
        if !payload.is_payment() {
            tracing::debug!(
                "Ignoring webhook with topic {:?} / action {:?}",
                payload.topic,
                payload.action
            );
            return Ok(());
        }

        let Some(payment_id) = payload.payment_id() else {
            tracing::warn!("Payment webhook without a correlation id, ignoring");
            return Ok(());
        };

        let Some(gateway) = &state.gateway else {
            tracing::warn!(
                "Received payment webhook {} but no gateway is configured",
                payment_id
            );
            return Ok(());
        };

        let payment = gateway.query_payment(&payment_id).await?;
        let Some(reservation_id) = payment.external_reference.clone() else {
            tracing::warn!("Payment {} carries no external reference, ignoring", payment_id);
            return Ok(());
        };

        let Some(reservation) =
            ReservationRepository::find_by_id(&state.db, &reservation_id).await?
        else {
            tracing::warn!(
                "Payment {} references unknown reservation {}",
                payment_id,
                reservation_id
            );
            return Ok(());
        };

        let now = chrono::Utc::now().naive_utc();
        match payment.payment_status() {
            PaymentStatus::Approved => {
                if reservation.used {
                    // Two-stage flow: the appointment already exists and the
                    // approval arrived afterwards.
                    if let Some(appointment_id) = &reservation.appointment_id {
                        AppointmentRepository::mark_paid(&state.db, appointment_id, now).await?;
                        tracing::info!(
                            "Payment {} confirmed existing appointment {}",
                            payment_id,
                            appointment_id
                        );
                    }
                } else {
                    let appointment = FinalizeService::finalize(
                        state,
                        &reservation.professional_id,
                        &reservation.id,
                        Some(PaymentStatus::Approved),
                    )
                    .await?;
                    tracing::info!(
                        "Payment {} finalized reservation {} into appointment {}",
                        payment_id,
                        reservation.id,
                        appointment.id
                    );
                }
            }
            PaymentStatus::Pending => {
                ReservationRepository::update_payment_status(
                    &state.db,
                    &reservation.id,
                    PaymentStatus::Pending,
                    now,
                )
                .await?;
                tracing::debug!("Payment {} still pending", payment_id);
            }
            _ => {
                // The hold keeps blocking its slot until it expires; a
                // failed payment never frees it early.
                ReservationRepository::update_payment_status(
                    &state.db,
                    &reservation.id,
                    PaymentStatus::Failed,
                    now,
                )
                .await?;
                tracing::info!(
                    "Payment {} failed for reservation {}",
                    payment_id,
                    reservation.id
                );
            }
        }

        Ok(())
    }
}
