use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::services::slots::SlotService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:professional_id/slots", get(get_available_slots))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub service_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<NaiveDateTime>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Candidate start times for one professional, service and date.
async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> AppResult<Json<SlotsResponse>> {
    let slots =
        SlotService::available_slots(&state, &professional_id, &query.service_id, query.date)
            .await?;

    Ok(Json(SlotsResponse {
        date: query.date,
        slots,
    }))
}
