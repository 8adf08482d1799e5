use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::db::models::{
    AvailabilityException, BookingSettings, CreateAvailabilityException, TimeWindow,
    UpdateBookingSettings, WorkingDay,
};
use crate::db::{
    AvailabilityExceptionRepository, BookingSettingsRepository, ProfessionalRepository,
    WorkingHoursRepository,
};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/:professional_id/working-hours",
            get(get_working_hours).put(put_working_hours),
        )
        .route(
            "/:professional_id/exceptions",
            get(list_exceptions).post(create_exception),
        )
        .route(
            "/:professional_id/exceptions/:exception_id",
            delete(delete_exception),
        )
        .route(
            "/:professional_id/settings",
            get(get_settings).patch(patch_settings),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PutWorkingHoursRequest {
    pub week: Vec<WorkingDay>,
}

#[derive(Debug, Deserialize)]
pub struct ListExceptionsQuery {
    pub date: chrono::NaiveDate,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_working_hours(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
) -> AppResult<Json<Vec<WorkingDay>>> {
    ProfessionalRepository::get(&state.db, &professional_id).await?;

    let week = WorkingHoursRepository::get_week(&state.db, &professional_id).await?;
    Ok(Json(week))
}

/// Replace the weekly schedule. Windows must be well-formed, ordered and
/// disjoint within each day.
async fn put_working_hours(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Json(request): Json<PutWorkingHoursRequest>,
) -> AppResult<Json<Vec<WorkingDay>>> {
    ProfessionalRepository::get(&state.db, &professional_id).await?;
    validate_week(&request.week)?;

    WorkingHoursRepository::replace_week(&state.db, &professional_id, &request.week).await?;
    let week = WorkingHoursRepository::get_week(&state.db, &professional_id).await?;
    Ok(Json(week))
}

async fn list_exceptions(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    axum::extract::Query(query): axum::extract::Query<ListExceptionsQuery>,
) -> AppResult<Json<Vec<AvailabilityException>>> {
    ProfessionalRepository::get(&state.db, &professional_id).await?;

    let exceptions =
        AvailabilityExceptionRepository::list_for_date(&state.db, &professional_id, query.date)
            .await?;
    Ok(Json(exceptions))
}

async fn create_exception(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Json(request): Json<CreateAvailabilityException>,
) -> AppResult<(StatusCode, Json<AvailabilityException>)> {
    ProfessionalRepository::get(&state.db, &professional_id).await?;

    if request.start_time >= request.end_time {
        return Err(AppError::Validation(
            "Exception interval must end after it starts".to_string(),
        ));
    }

    let exception =
        AvailabilityExceptionRepository::create(&state.db, &professional_id, request).await?;
    Ok((StatusCode::CREATED, Json(exception)))
}

async fn delete_exception(
    State(state): State<Arc<AppState>>,
    Path((professional_id, exception_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let deleted =
        AvailabilityExceptionRepository::delete(&state.db, &professional_id, &exception_id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!(
            "Exception {} not found",
            exception_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
) -> AppResult<Json<BookingSettings>> {
    ProfessionalRepository::get(&state.db, &professional_id).await?;

    let settings = BookingSettingsRepository::get_or_create(&state.db, &professional_id).await?;
    Ok(Json(settings))
}

async fn patch_settings(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Json(request): Json<UpdateBookingSettings>,
) -> AppResult<Json<BookingSettings>> {
    request.validate()?;
    ProfessionalRepository::get(&state.db, &professional_id).await?;

    let settings = BookingSettingsRepository::update(&state.db, &professional_id, request).await?;
    Ok(Json(settings))
}

fn validate_week(week: &[WorkingDay]) -> AppResult<()> {
    for day in week {
        if !(0..7).contains(&day.weekday) {
            return Err(AppError::Validation(format!(
                "Weekday {} out of range (0 = Monday .. 6 = Sunday)",
                day.weekday
            )));
        }
        let mut previous: Option<&TimeWindow> = None;
        for window in &day.windows {
            if window.start >= window.end {
                return Err(AppError::Validation(
                    "Working hour window must end after it starts".to_string(),
                ));
            }
            if let Some(prev) = previous {
                if window.start < prev.end {
                    return Err(AppError::Validation(
                        "Working hour windows must be ordered and disjoint".to_string(),
                    ));
                }
            }
            previous = Some(window);
        }
    }
    Ok(())
}
