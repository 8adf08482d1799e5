use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{AvailabilityException, CreateAvailabilityException};
use crate::error::{AppError, AppResult};

pub struct AvailabilityExceptionRepository;

impl AvailabilityExceptionRepository {
    pub async fn create(
        pool: &SqlitePool,
        professional_id: &str,
        exception: CreateAvailabilityException,
    ) -> AppResult<AvailabilityException> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, AvailabilityException>(
            r#"
            INSERT INTO availability_exceptions (
                id,
                professional_id,
                date,
                start_time,
                end_time,
                kind,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, professional_id, date, start_time, end_time, kind, created_at
            "#,
        )
        .bind(id)
        .bind(professional_id)
        .bind(exception.date)
        .bind(exception.start_time)
        .bind(exception.end_time)
        .bind(exception.kind)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, professional_id: &str, id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM availability_exceptions WHERE id = ? AND professional_id = ?",
        )
        .bind(id)
        .bind(professional_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_date(
        pool: &SqlitePool,
        professional_id: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<AvailabilityException>> {
        sqlx::query_as::<_, AvailabilityException>(
            r#"
            SELECT id, professional_id, date, start_time, end_time, kind, created_at
            FROM availability_exceptions
            WHERE professional_id = ? AND date = ?
            ORDER BY start_time ASC
            "#,
        )
        .bind(professional_id)
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
