use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Removes availability for the interval on that date.
    Blocked,
    /// Adds bookable time outside the weekly working hours.
    Extra,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub id: String,
    pub professional_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub kind: ExceptionKind,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAvailabilityException {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub kind: ExceptionKind,
}
