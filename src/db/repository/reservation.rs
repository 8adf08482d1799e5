use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::db::models::{NewReservation, PaymentStatus, Reservation};
use crate::error::{AppError, AppResult};

/// Repository for time-limited slot holds.
///
/// Implementation notes:
/// - Hold creation is a single guarded
///   `INSERT ... SELECT ... WHERE NOT EXISTS ... RETURNING` statement.
///   SQLite serializes writers, so of two concurrent inserts for
///   overlapping slots exactly one passes its guards; the loser gets zero
///   rows and never produces a visible side effect.
/// - Finalization claims the row first (`UPDATE ... WHERE used = 0 ...
///   RETURNING`) so the writer lock is taken before any read in the
///   transaction.
/// - Every read filters expired holds (`used = 0 AND expires_at > now`);
///   expiry is passive, there is no cleanup pass here.
pub struct ReservationRepository;

impl ReservationRepository {
    /// Atomically insert a hold if, and only if, the buffer-expanded
    /// interval is free among appointments and active reservations and the
    /// professional's day cap is not reached. Returns `None` when any guard
    /// fails; the caller classifies the failure.
    ///
    /// `conflict_start`/`conflict_end` is the requested interval expanded by
    /// the combined buffers on both sides, compared against the raw stored
    /// intervals (equivalent to expanding each side independently).
    #[allow(clippy::too_many_arguments)]
    pub async fn try_insert_hold(
        pool: &SqlitePool,
        id: &str,
        hold: &NewReservation,
        now: NaiveDateTime,
        conflict_start: NaiveDateTime,
        conflict_end: NaiveDateTime,
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
        max_per_day: i64,
    ) -> AppResult<Option<Reservation>> {
        sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (
                id,
                professional_id,
                service_id,
                start_time,
                end_time,
                client_name,
                client_email,
                client_phone,
                expires_at,
                used,
                payment_status,
                gateway_ref,
                appointment_id,
                created_at,
                updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, NULL, NULL, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM appointments
                WHERE professional_id = ?
                  AND status <> 'canceled'
                  AND start_time < ?
                  AND end_time > ?
            )
            AND NOT EXISTS (
                SELECT 1 FROM reservations
                WHERE professional_id = ?
                  AND used = 0
                  AND expires_at > ?
                  AND start_time < ?
                  AND end_time > ?
            )
            AND (
                (SELECT COUNT(*) FROM appointments
                 WHERE professional_id = ?
                   AND status <> 'canceled'
                   AND start_time >= ? AND start_time < ?)
                +
                (SELECT COUNT(*) FROM reservations
                 WHERE professional_id = ?
                   AND used = 0
                   AND expires_at > ?
                   AND start_time >= ? AND start_time < ?)
            ) < ?
            RETURNING
                id,
                professional_id,
                service_id,
                start_time,
                end_time,
                client_name,
                client_email,
                client_phone,
                expires_at,
                used,
                payment_status,
                gateway_ref,
                appointment_id,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(&hold.professional_id)
        .bind(&hold.service_id)
        .bind(hold.start_time)
        .bind(hold.end_time)
        .bind(&hold.client_name)
        .bind(&hold.client_email)
        .bind(&hold.client_phone)
        .bind(hold.expires_at)
        .bind(hold.payment_status)
        .bind(now)
        .bind(now)
        .bind(&hold.professional_id)
        .bind(conflict_end)
        .bind(conflict_start)
        .bind(&hold.professional_id)
        .bind(now)
        .bind(conflict_end)
        .bind(conflict_start)
        .bind(&hold.professional_id)
        .bind(day_start)
        .bind(day_end)
        .bind(&hold.professional_id)
        .bind(now)
        .bind(day_start)
        .bind(day_end)
        .bind(max_per_day)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Claim a still-valid hold for finalization. Matches only unused,
    /// unexpired rows, so exactly one concurrent finalizer wins. Run this
    /// as the first statement of the finalizing transaction: the write
    /// takes the lock before anything is read.
    pub async fn claim<'e, E>(
        executor: E,
        reservation_id: &str,
        professional_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<Reservation>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations
            SET used = 1, updated_at = ?
            WHERE id = ? AND professional_id = ? AND used = 0 AND expires_at > ?
            RETURNING
                id,
                professional_id,
                service_id,
                start_time,
                end_time,
                client_name,
                client_email,
                client_phone,
                expires_at,
                used,
                payment_status,
                gateway_ref,
                appointment_id,
                created_at,
                updated_at
            "#,
        )
        .bind(now)
        .bind(reservation_id)
        .bind(professional_id)
        .bind(now)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Link the appointment created by the finalizer and record the final
    /// payment status on the hold.
    pub async fn link_appointment<'e, E>(
        executor: E,
        reservation_id: &str,
        appointment_id: &str,
        payment_status: PaymentStatus,
        now: NaiveDateTime,
    ) -> AppResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
            UPDATE reservations
            SET appointment_id = ?, payment_status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(appointment_id)
        .bind(payment_status)
        .bind(now)
        .bind(reservation_id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> AppResult<Option<Reservation>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Reservation>(
            r#"
            SELECT
                id,
                professional_id,
                service_id,
                start_time,
                end_time,
                client_name,
                client_email,
                client_phone,
                expires_at,
                used,
                payment_status,
                gateway_ref,
                appointment_id,
                created_at,
                updated_at
            FROM reservations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Unexpired, unused holds for a professional on one day.
    pub async fn list_active_for_day(
        pool: &SqlitePool,
        professional_id: &str,
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<Vec<Reservation>> {
        sqlx::query_as::<_, Reservation>(
            r#"
            SELECT
                id,
                professional_id,
                service_id,
                start_time,
                end_time,
                client_name,
                client_email,
                client_phone,
                expires_at,
                used,
                payment_status,
                gateway_ref,
                appointment_id,
                created_at,
                updated_at
            FROM reservations
            WHERE professional_id = ?
              AND used = 0
              AND expires_at > ?
              AND start_time >= ? AND start_time < ?
            ORDER BY start_time ASC
            "#,
        )
        .bind(professional_id)
        .bind(now)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count_active_for_day(
        pool: &SqlitePool,
        professional_id: &str,
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM reservations
            WHERE professional_id = ?
              AND used = 0
              AND expires_at > ?
              AND start_time >= ? AND start_time < ?
            "#,
        )
        .bind(professional_id)
        .bind(now)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Record the gateway checkout preference created for this hold.
    pub async fn set_gateway_ref(
        pool: &SqlitePool,
        reservation_id: &str,
        gateway_ref: &str,
        now: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE reservations
            SET gateway_ref = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(gateway_ref)
        .bind(now)
        .bind(reservation_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Record a payment status reported by the gateway on an unused hold.
    pub async fn update_payment_status(
        pool: &SqlitePool,
        reservation_id: &str,
        payment_status: PaymentStatus,
        now: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE reservations
            SET payment_status = ?, updated_at = ?
            WHERE id = ? AND used = 0
            "#,
        )
        .bind(payment_status)
        .bind(now)
        .bind(reservation_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
