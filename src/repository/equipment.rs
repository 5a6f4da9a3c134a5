//! Equipment repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::EquipmentStore;
use crate::{
    error::{AppError, AppResult},
    models::equipment::{
        CreateEquipment, Equipment, EquipmentDeletion, EquipmentQuery, EquipmentUpdate, UpdateEquipment,
        DEFAULT_CONDITION,
    },
};

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn name_conflict(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict("Equipment with this name already exists".to_string())
        }
        other => AppError::Database(other),
    }
}

#[async_trait]
impl EquipmentStore for EquipmentRepository {
    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>(
            r#"
            SELECT * FROM equipment
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::bool IS NULL
                   OR ($2 AND available_count > 0)
                   OR (NOT $2 AND available_count = 0))
            ORDER BY name
            "#,
        )
        .bind(&query.category)
        .bind(query.available)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Equipment>> {
        let row = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create(&self, data: &CreateEquipment, now: DateTime<Utc>) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (name, category, condition, total_quantity, available_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(data.name.trim())
        .bind(&data.category)
        .bind(data.condition.as_deref().unwrap_or(DEFAULT_CONDITION))
        .bind(data.total_quantity)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(name_conflict)
    }

    async fn update(&self, id: i32, data: &UpdateEquipment, now: DateTime<Utc>) -> AppResult<EquipmentUpdate> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(current) = current else {
            return Ok(EquipmentUpdate::Missing);
        };

        let next = match current.apply_update(data, now) {
            Ok(next) => next,
            Err(on_loan) => return Ok(EquipmentUpdate::BelowOnLoan { on_loan }),
        };

        let updated = sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment
            SET name = $2, category = $3, condition = $4,
                total_quantity = $5, available_count = $6, updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&next.name)
        .bind(&next.category)
        .bind(&next.condition)
        .bind(next.total_quantity)
        .bind(next.available_count)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(name_conflict)?;

        tx.commit().await?;
        Ok(EquipmentUpdate::Updated(updated))
    }

    async fn delete(&self, id: i32) -> AppResult<EquipmentDeletion> {
        let mut tx = self.pool.begin().await?;

        // Row lock blocks concurrent request inserts (FK check) until we are done
        let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(EquipmentDeletion::Missing);
        }

        let active_requests: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM requests WHERE equipment_id = $1 AND status IN ('pending', 'approved')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active_requests > 0 {
            return Ok(EquipmentDeletion::InUse { active_requests });
        }

        sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(EquipmentDeletion::Deleted)
    }
}
