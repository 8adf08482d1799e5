use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::db::models::{Appointment, NewAppointment};
use crate::error::{AppError, AppResult};

pub struct AppointmentRepository;

impl AppointmentRepository {
    /// Insert a new appointment. Takes an executor so the finalizer can run
    /// it inside its claiming transaction.
    pub async fn create<'e, E>(
        executor: E,
        id: &str,
        confirmation_code: &str,
        appointment: &NewAppointment,
        now: NaiveDateTime,
    ) -> AppResult<Appointment>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (
                id,
                professional_id,
                service_id,
                client_name,
                client_email,
                client_phone,
                start_time,
                end_time,
                status,
                payment_status,
                confirmation_code,
                created_at,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id,
                professional_id,
                service_id,
                client_name,
                client_email,
                client_phone,
                start_time,
                end_time,
                status,
                payment_status,
                confirmation_code,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(&appointment.professional_id)
        .bind(&appointment.service_id)
        .bind(&appointment.client_name)
        .bind(&appointment.client_email)
        .bind(&appointment.client_phone)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(appointment.status)
        .bind(appointment.payment_status)
        .bind(confirmation_code)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> AppResult<Option<Appointment>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT
                id,
                professional_id,
                service_id,
                client_name,
                client_email,
                client_phone,
                start_time,
                end_time,
                status,
                payment_status,
                confirmation_code,
                created_at,
                updated_at
            FROM appointments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Non-canceled appointments for a professional on one day. Takes an
    /// executor so the finalizer's defensive re-check can run inside its
    /// transaction.
    pub async fn list_blocking_for_day<'e, E>(
        executor: E,
        professional_id: &str,
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
    ) -> AppResult<Vec<Appointment>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT
                id,
                professional_id,
                service_id,
                client_name,
                client_email,
                client_phone,
                start_time,
                end_time,
                status,
                payment_status,
                confirmation_code,
                created_at,
                updated_at
            FROM appointments
            WHERE professional_id = ?
              AND status <> 'canceled'
              AND start_time >= ? AND start_time < ?
            ORDER BY start_time ASC
            "#,
        )
        .bind(professional_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count_blocking_for_day(
        pool: &SqlitePool,
        professional_id: &str,
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM appointments
            WHERE professional_id = ?
              AND status <> 'canceled'
              AND start_time >= ? AND start_time < ?
            "#,
        )
        .bind(professional_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Two-stage payment flow: the gateway confirms a payment after the
    /// appointment already exists. Records the approval and promotes a
    /// scheduled appointment to confirmed.
    pub async fn mark_paid(
        pool: &SqlitePool,
        id: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<Appointment>> {
        sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET payment_status = 'approved',
                status = CASE WHEN status = 'scheduled' THEN 'confirmed' ELSE status END,
                updated_at = ?
            WHERE id = ?
            RETURNING
                id,
                professional_id,
                service_id,
                client_name,
                client_email,
                client_phone,
                start_time,
                end_time,
                status,
                payment_status,
                confirmation_code,
                created_at,
                updated_at
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}
