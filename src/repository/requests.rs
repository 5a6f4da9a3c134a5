//! Borrow requests repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Transaction};

use super::RequestsStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        borrow_request::{
            BorrowRequest, BorrowerSummary, NewBorrowRequest, RequestDetails, RequestFilter, RequestStatus,
            TransitionOutcome,
        },
        equipment::EquipmentSummary,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT r.*,
           u.name AS user_name, u.email AS user_email,
           e.name AS equipment_name, e.category AS equipment_category
    FROM requests r
    LEFT JOIN users u ON u.id = r.user_id
    LEFT JOIN equipment e ON e.id = r.equipment_id
"#;

/// Request joined with borrower and equipment columns
#[derive(Debug, FromRow)]
struct RequestDetailsRow {
    #[sqlx(flatten)]
    request: BorrowRequest,
    user_name: Option<String>,
    user_email: Option<String>,
    equipment_name: Option<String>,
    equipment_category: Option<String>,
}

impl From<RequestDetailsRow> for RequestDetails {
    fn from(row: RequestDetailsRow) -> Self {
        let user = match (row.user_name, row.user_email) {
            (Some(name), Some(email)) => Some(BorrowerSummary {
                id: row.request.user_id,
                name,
                email,
            }),
            _ => None,
        };
        let equipment = match (row.request.equipment_id, row.equipment_name, row.equipment_category) {
            (Some(id), Some(name), Some(category)) => Some(EquipmentSummary { id, name, category }),
            _ => None,
        };
        RequestDetails::resolve(row.request, user, equipment)
    }
}

#[derive(Clone)]
pub struct RequestsRepository {
    pool: Pool<Postgres>,
}

impl RequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Move a request from `from` to `to`, returning its equipment id when
    /// the status matched. On mismatch the outcome explains why.
    async fn swap_status(
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
        from: RequestStatus,
        to: RequestStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Result<Option<i32>, TransitionOutcome>> {
        if !from.can_transition_to(to) {
            return Err(AppError::Internal(format!("illegal transition {} -> {}", from, to)));
        }

        let stamp_column = match to {
            RequestStatus::Approved => "approved_at",
            RequestStatus::Rejected => "rejected_at",
            RequestStatus::Returned => "returned_at",
            RequestStatus::Pending => {
                return Err(AppError::Internal("requests never move back to pending".to_string()));
            }
        };

        let query = format!(
            "UPDATE requests SET status = $3, {} = $4, updated_at = $4 \
             WHERE id = $1 AND status = $2 RETURNING equipment_id",
            stamp_column
        );

        let swapped = sqlx::query_scalar::<_, Option<i32>>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(at)
            .fetch_optional(&mut **tx)
            .await?;

        if let Some(equipment_id) = swapped {
            return Ok(Ok(equipment_id));
        }

        let current = sqlx::query_scalar::<_, RequestStatus>("SELECT status FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(Err(match current {
            Some(status) => TransitionOutcome::WrongState(status),
            None => TransitionOutcome::Missing,
        }))
    }
}

#[async_trait]
impl RequestsStore for RequestsRepository {
    async fn find_active(&self, user_id: i32, equipment_id: i32) -> AppResult<Option<BorrowRequest>> {
        let row = sqlx::query_as::<_, BorrowRequest>(
            r#"
            SELECT * FROM requests
            WHERE user_id = $1 AND equipment_id = $2 AND status IN ('pending', 'approved')
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(equipment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, request: &NewBorrowRequest) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequest>(
            r#"
            INSERT INTO requests (user_id, equipment_id, status, borrow_date, due_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $4, $4)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.equipment_id)
        .bind(RequestStatus::Pending)
        .bind(request.borrow_date)
        .bind(request.due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            // requests_one_active_per_pair
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Active request already exists for this equipment".to_string())
            }
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                AppError::Unavailable("Equipment not available".to_string())
            }
            other => AppError::Database(other),
        })
    }

    async fn approve(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let equipment_id =
            match Self::swap_status(&mut tx, id, RequestStatus::Pending, RequestStatus::Approved, at).await? {
                Ok(Some(equipment_id)) => equipment_id,
                Ok(None) => return Ok(TransitionOutcome::OutOfStock),
                Err(outcome) => return Ok(outcome),
            };

        let taken = sqlx::query(
            r#"
            UPDATE equipment
            SET available_count = available_count - 1, updated_at = $2
            WHERE id = $1 AND available_count > 0
            "#,
        )
        .bind(equipment_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        if taken.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(TransitionOutcome::OutOfStock);
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied)
    }

    async fn reject(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Err(outcome) =
            Self::swap_status(&mut tx, id, RequestStatus::Pending, RequestStatus::Rejected, at).await?
        {
            return Ok(outcome);
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied)
    }

    async fn mark_returned(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let equipment_id =
            match Self::swap_status(&mut tx, id, RequestStatus::Approved, RequestStatus::Returned, at).await? {
                Ok(Some(equipment_id)) => equipment_id,
                Ok(None) => return Ok(TransitionOutcome::StockOverflow),
                Err(outcome) => return Ok(outcome),
            };

        let restored = sqlx::query(
            r#"
            UPDATE equipment
            SET available_count = available_count + 1, updated_at = $2
            WHERE id = $1 AND available_count < total_quantity
            "#,
        )
        .bind(equipment_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        if restored.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(TransitionOutcome::StockOverflow);
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied)
    }

    async fn get_details(&self, id: i32) -> AppResult<Option<RequestDetails>> {
        let query = format!("{} WHERE r.id = $1", DETAILS_SELECT);
        let row = sqlx::query_as::<_, RequestDetailsRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_details(&self, filter: RequestFilter) -> AppResult<Vec<RequestDetails>> {
        let query = format!(
            "{} WHERE ($1::int IS NULL OR r.user_id = $1) \
               AND ($2::text IS NULL OR r.status = $2) \
             ORDER BY r.created_at DESC, r.id DESC",
            DETAILS_SELECT
        );
        let rows = sqlx::query_as::<_, RequestDetailsRow>(&query)
            .bind(filter.user_id)
            .bind(filter.status)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
