use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Per-professional booking configuration. Buffers expand every booked
/// interval when checking for conflicts; the notice window bounds how far
/// in advance a booking may be placed; the hold duration controls how long
/// an unpaid reservation blocks its slot.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingSettings {
    pub professional_id: String,
    pub buffer_before_minutes: i64,
    pub buffer_after_minutes: i64,
    pub min_notice_hours: i64,
    pub max_notice_days: i64,
    pub max_appointments_per_day: i64,
    pub reservation_hold_minutes: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBookingSettings {
    #[validate(range(min = 0, message = "Buffer must not be negative"))]
    pub buffer_before_minutes: Option<i64>,
    #[validate(range(min = 0, message = "Buffer must not be negative"))]
    pub buffer_after_minutes: Option<i64>,
    #[validate(range(min = 0, message = "Notice hours must not be negative"))]
    pub min_notice_hours: Option<i64>,
    #[validate(range(min = 1, message = "Notice days must be at least 1"))]
    pub max_notice_days: Option<i64>,
    #[validate(range(min = 1, message = "Daily cap must be at least 1"))]
    pub max_appointments_per_day: Option<i64>,
    #[validate(range(min = 1, message = "Hold duration must be at least 1 minute"))]
    pub reservation_hold_minutes: Option<i64>,
}
