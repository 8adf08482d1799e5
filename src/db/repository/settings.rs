use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::{BookingSettings, UpdateBookingSettings};
use crate::error::{AppError, AppResult};

const SETTINGS_COLUMNS: &str = r#"
    professional_id,
    buffer_before_minutes,
    buffer_after_minutes,
    min_notice_hours,
    max_notice_days,
    max_appointments_per_day,
    reservation_hold_minutes,
    created_at,
    updated_at
"#;

pub struct BookingSettingsRepository;

impl BookingSettingsRepository {
    /// Fetch the professional's settings, creating the row with schema
    /// defaults on first access.
    pub async fn get_or_create(
        pool: &SqlitePool,
        professional_id: &str,
    ) -> AppResult<BookingSettings> {
        if let Some(settings) = Self::find(pool, professional_id).await? {
            return Ok(settings);
        }

        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO professional_settings (professional_id, created_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (professional_id) DO NOTHING
            "#,
        )
        .bind(professional_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Self::find(pool, professional_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking settings not found".to_string()))
    }

    async fn find(pool: &SqlitePool, professional_id: &str) -> AppResult<Option<BookingSettings>> {
        sqlx::query_as::<_, BookingSettings>(&format!(
            r#"
            SELECT {SETTINGS_COLUMNS}
            FROM professional_settings
            WHERE professional_id = ?
            "#,
        ))
        .bind(professional_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Apply a partial update; absent fields keep their current value.
    pub async fn update(
        pool: &SqlitePool,
        professional_id: &str,
        update: UpdateBookingSettings,
    ) -> AppResult<BookingSettings> {
        // Make sure the row exists before updating it.
        Self::get_or_create(pool, professional_id).await?;

        let now = Utc::now().naive_utc();
        sqlx::query_as::<_, BookingSettings>(&format!(
            r#"
            UPDATE professional_settings
            SET
                buffer_before_minutes = COALESCE(?, buffer_before_minutes),
                buffer_after_minutes = COALESCE(?, buffer_after_minutes),
                min_notice_hours = COALESCE(?, min_notice_hours),
                max_notice_days = COALESCE(?, max_notice_days),
                max_appointments_per_day = COALESCE(?, max_appointments_per_day),
                reservation_hold_minutes = COALESCE(?, reservation_hold_minutes),
                updated_at = ?
            WHERE professional_id = ?
            RETURNING {SETTINGS_COLUMNS}
            "#,
        ))
        .bind(update.buffer_before_minutes)
        .bind(update.buffer_after_minutes)
        .bind(update.min_notice_hours)
        .bind(update.max_notice_days)
        .bind(update.max_appointments_per_day)
        .bind(update.reservation_hold_minutes)
        .bind(now)
        .bind(professional_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}
