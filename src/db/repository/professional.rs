use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateProfessional, Professional};
use crate::error::{AppError, AppResult};

pub struct ProfessionalRepository;

impl ProfessionalRepository {
    pub async fn create(
        pool: &SqlitePool,
        professional: CreateProfessional,
    ) -> AppResult<Professional> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Professional>(
            r#"
            INSERT INTO professionals (id, name, email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(professional.name)
        .bind(professional.email)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Professional>> {
        sqlx::query_as::<_, Professional>(
            r#"
            SELECT id, name, email, created_at, updated_at
            FROM professionals
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Load a professional or fail with `NotFound`.
    pub async fn get(pool: &SqlitePool, id: &str) -> AppResult<Professional> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Professional {} not found", id)))
    }
}
