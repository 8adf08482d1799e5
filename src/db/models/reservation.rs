use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting gateway confirmation.
    Pending,
    Approved,
    Failed,
    /// The service does not take online payment.
    NotRequired,
}

/// A time-limited hold on a slot. Created by the reservation manager,
/// mutated exactly once by the finalizer (`used = true`), or left to
/// passively expire: an unused reservation past `expires_at` no longer
/// blocks its slot and is never deleted eagerly.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub professional_id: String,
    pub service_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub expires_at: NaiveDateTime,
    pub used: bool,
    pub payment_status: PaymentStatus,
    /// Checkout preference id at the payment gateway, when one was created.
    pub gateway_ref: Option<String>,
    /// Set by the finalizer together with `used = true`.
    pub appointment_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Data required to insert a new hold.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub professional_id: String,
    pub service_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub expires_at: NaiveDateTime,
    pub payment_status: PaymentStatus,
}
