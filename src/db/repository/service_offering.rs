use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateServiceOffering, ServiceOffering};
use crate::error::{AppError, AppResult};

const SERVICE_COLUMNS: &str = r#"
    id,
    professional_id,
    name,
    duration_minutes,
    price_cents,
    currency,
    requires_payment,
    active,
    created_at,
    updated_at
"#;

pub struct ServiceOfferingRepository;

impl ServiceOfferingRepository {
    pub async fn create(
        pool: &SqlitePool,
        professional_id: &str,
        service: CreateServiceOffering,
    ) -> AppResult<ServiceOffering> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, ServiceOffering>(&format!(
            r#"
            INSERT INTO service_offerings (
                id,
                professional_id,
                name,
                duration_minutes,
                price_cents,
                currency,
                requires_payment,
                active,
                created_at,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING {SERVICE_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(professional_id)
        .bind(service.name)
        .bind(service.duration_minutes)
        .bind(service.price_cents)
        .bind(service.currency.unwrap_or_else(|| "BRL".to_string()))
        .bind(service.requires_payment.unwrap_or(false))
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_for_professional(
        pool: &SqlitePool,
        professional_id: &str,
        service_id: &str,
    ) -> AppResult<Option<ServiceOffering>> {
        sqlx::query_as::<_, ServiceOffering>(&format!(
            r#"
            SELECT {SERVICE_COLUMNS}
            FROM service_offerings
            WHERE id = ? AND professional_id = ?
            "#,
        ))
        .bind(service_id)
        .bind(professional_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_active(
        pool: &SqlitePool,
        professional_id: &str,
    ) -> AppResult<Vec<ServiceOffering>> {
        sqlx::query_as::<_, ServiceOffering>(&format!(
            r#"
            SELECT {SERVICE_COLUMNS}
            FROM service_offerings
            WHERE professional_id = ? AND active = 1
            ORDER BY name ASC
            "#,
        ))
        .bind(professional_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
