use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::db::models::{CreateProfessional, CreateServiceOffering, Professional, ServiceOffering};
use crate::db::{ProfessionalRepository, ServiceOfferingRepository};
use crate::error::AppResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_professional))
        .route(
            "/:professional_id/services",
            get(list_services).post(create_service),
        )
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_professional(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateProfessional>,
) -> AppResult<(StatusCode, Json<Professional>)> {
    request.validate()?;

    let professional = ProfessionalRepository::create(&state.db, request).await?;
    Ok((StatusCode::CREATED, Json(professional)))
}

async fn create_service(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Json(request): Json<CreateServiceOffering>,
) -> AppResult<(StatusCode, Json<ServiceOffering>)> {
    request.validate()?;
    ProfessionalRepository::get(&state.db, &professional_id).await?;

    let service = ServiceOfferingRepository::create(&state.db, &professional_id, request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// Active services a client can pick from.
async fn list_services(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
) -> AppResult<Json<Vec<ServiceOffering>>> {
    ProfessionalRepository::get(&state.db, &professional_id).await?;

    let services = ServiceOfferingRepository::list_active(&state.db, &professional_id).await?;
    Ok(Json(services))
}
