use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{TimeWindow, WorkingDay, WorkingDayRow, WorkingIntervalRow};
use crate::error::{AppError, AppResult};

pub struct WorkingHoursRepository;

impl WorkingHoursRepository {
    /// Working hours for one weekday, or `None` when nothing is configured.
    pub async fn get_day(
        pool: &SqlitePool,
        professional_id: &str,
        weekday: i64,
    ) -> AppResult<Option<WorkingDay>> {
        let day = sqlx::query_as::<_, WorkingDayRow>(
            r#"
            SELECT weekday, enabled
            FROM working_hours
            WHERE professional_id = ? AND weekday = ?
            "#,
        )
        .bind(professional_id)
        .bind(weekday)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        let Some(day) = day else {
            return Ok(None);
        };

        let intervals = sqlx::query_as::<_, WorkingIntervalRow>(
            r#"
            SELECT weekday, start_time, end_time
            FROM working_hour_intervals
            WHERE professional_id = ? AND weekday = ?
            ORDER BY start_time ASC
            "#,
        )
        .bind(professional_id)
        .bind(weekday)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Some(WorkingDay {
            weekday: day.weekday,
            enabled: day.enabled,
            windows: intervals
                .into_iter()
                .map(|i| TimeWindow {
                    start: i.start_time,
                    end: i.end_time,
                })
                .collect(),
        }))
    }

    /// The full week, one entry per weekday 0..=6. Weekdays without a
    /// configured row come back disabled and empty.
    pub async fn get_week(pool: &SqlitePool, professional_id: &str) -> AppResult<Vec<WorkingDay>> {
        let days = sqlx::query_as::<_, WorkingDayRow>(
            r#"
            SELECT weekday, enabled
            FROM working_hours
            WHERE professional_id = ?
            ORDER BY weekday ASC
            "#,
        )
        .bind(professional_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let intervals = sqlx::query_as::<_, WorkingIntervalRow>(
            r#"
            SELECT weekday, start_time, end_time
            FROM working_hour_intervals
            WHERE professional_id = ?
            ORDER BY weekday ASC, start_time ASC
            "#,
        )
        .bind(professional_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let week = (0..7)
            .map(|weekday| WorkingDay {
                weekday,
                enabled: days
                    .iter()
                    .find(|d| d.weekday == weekday)
                    .map(|d| d.enabled)
                    .unwrap_or(false),
                windows: intervals
                    .iter()
                    .filter(|i| i.weekday == weekday)
                    .map(|i| TimeWindow {
                        start: i.start_time,
                        end: i.end_time,
                    })
                    .collect(),
            })
            .collect();

        Ok(week)
    }

    /// Replace the whole weekly schedule in one transaction.
    pub async fn replace_week(
        pool: &SqlitePool,
        professional_id: &str,
        week: &[WorkingDay],
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        sqlx::query("DELETE FROM working_hours WHERE professional_id = ?")
            .bind(professional_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        sqlx::query("DELETE FROM working_hour_intervals WHERE professional_id = ?")
            .bind(professional_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        for day in week {
            sqlx::query(
                r#"
                INSERT INTO working_hours (professional_id, weekday, enabled, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(professional_id)
            .bind(day.weekday)
            .bind(day.enabled)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

            for window in &day.windows {
                sqlx::query(
                    r#"
                    INSERT INTO working_hour_intervals (id, professional_id, weekday, start_time, end_time)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(professional_id)
                .bind(day.weekday)
                .bind(window.start)
                .bind(window.end)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }
}
