use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: String,
    pub professional_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub currency: String,
    /// Paid services go through the gateway checkout before finalization;
    /// free/manual services can be finalized directly.
    pub requires_payment: bool,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateServiceOffering {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: i64,
    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price_cents: i64,
    pub currency: Option<String>,
    pub requires_payment: Option<bool>,
}
