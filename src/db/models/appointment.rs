use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::reservation::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Canceled,
    Finished,
}

impl AppointmentStatus {
    /// Canceled appointments release their slot; every other status
    /// keeps blocking overlapping bookings.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Canceled)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub professional_id: String,
    pub service_id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    /// Short human-friendly code shared with the client.
    pub confirmation_code: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Data required to insert a new appointment.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub professional_id: String,
    pub service_id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
}
