use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{AppointmentStatus, PaymentStatus};
use crate::error::AppResult;
use crate::services::finalize::FinalizeService;
use crate::services::reservations::{CreateReservationRequest, ReservationService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:professional_id/reservations", post(create_reservation))
        .route(
            "/:professional_id/reservations/:reservation_id/finalize",
            post(finalize_reservation),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub reservation_id: String,
    pub expires_at: NaiveDateTime,
    pub payment_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinalizeRequest {
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub appointment_id: String,
    pub status: AppointmentStatus,
    pub confirmation_code: String,
    pub start_time: NaiveDateTime,
}

// ============================================================================
// Handlers
// ============================================================================

/// Open a time-limited hold on a slot. For paid services the response
/// carries the gateway checkout URL the client is redirected to.
async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Json(request): Json<CreateReservationRequest>,
) -> AppResult<(StatusCode, Json<ReservationResponse>)> {
    request.validate()?;

    let outcome = ReservationService::create(&state, &professional_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse {
            reservation_id: outcome.reservation.id,
            expires_at: outcome.reservation.expires_at,
            payment_required: outcome.checkout_url.is_some(),
            checkout_url: outcome.checkout_url,
        }),
    ))
}

/// Promote a still-valid hold into an appointment. Safe to call more than
/// once: replays get the already-created appointment back.
async fn finalize_reservation(
    State(state): State<Arc<AppState>>,
    Path((professional_id, reservation_id)): Path<(String, String)>,
    request: Option<Json<FinalizeRequest>>,
) -> AppResult<Json<FinalizeResponse>> {
    let payment_status = request.and_then(|Json(r)| r.payment_status);

    let appointment =
        FinalizeService::finalize(&state, &professional_id, &reservation_id, payment_status)
            .await?;

    Ok(Json(FinalizeResponse {
        appointment_id: appointment.id,
        status: appointment.status,
        confirmation_code: appointment.confirmation_code,
        start_time: appointment.start_time,
    }))
}
