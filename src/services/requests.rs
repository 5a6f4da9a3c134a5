//! Borrow request lifecycle
//!
//! Creation only checks stock, it does not reserve a unit: several pending
//! requests may compete for the last one. Approval is the step that takes a
//! unit off the shelf and it re-checks availability atomically.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow_request::{
            CreateBorrowRequest, NewBorrowRequest, RequestDetails, RequestFilter, RequestQuery, RequestStatus,
            TransitionOutcome,
        },
        user::UserClaims,
    },
    repository::{EquipmentStore, RequestsStore},
};

const NOT_PENDING: &str = "Request not found or already processed";
const NOT_APPROVED: &str = "Request not found or not approved";

#[derive(Clone)]
pub struct RequestsService {
    equipment: Arc<dyn EquipmentStore>,
    requests: Arc<dyn RequestsStore>,
}

impl RequestsService {
    pub fn new(equipment: Arc<dyn EquipmentStore>, requests: Arc<dyn RequestsStore>) -> Self {
        Self { equipment, requests }
    }

    /// Open a pending request for the calling student
    pub async fn create(&self, user_id: i32, data: &CreateBorrowRequest) -> AppResult<RequestDetails> {
        let now = Utc::now();
        if let Some(due_date) = data.due_date {
            if due_date <= now {
                return Err(AppError::Validation("dueDate must be in the future".to_string()));
            }
        }

        let equipment = self.equipment.get_by_id(data.equipment_id).await?;
        if !equipment.as_ref().is_some_and(|e| e.is_available()) {
            return Err(AppError::Unavailable("Equipment not available".to_string()));
        }

        if self
            .requests
            .find_active(user_id, data.equipment_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Active request already exists for this equipment".to_string(),
            ));
        }

        let request = self
            .requests
            .create(&NewBorrowRequest {
                user_id,
                equipment_id: data.equipment_id,
                borrow_date: now,
                due_date: data.due_date,
            })
            .await?;

        tracing::info!(
            request_id = request.id,
            user_id,
            equipment_id = data.equipment_id,
            "borrow request created"
        );
        self.details(request.id).await
    }

    /// pending -> approved, consuming one unit of stock
    pub async fn approve(&self, id: i32, actor: &UserClaims) -> AppResult<RequestDetails> {
        let outcome = self.requests.approve(id, Utc::now()).await?;
        self.settle(id, outcome, RequestStatus::Approved, NOT_PENDING)?;
        tracing::info!(request_id = id, actor_id = actor.user_id, "borrow request approved");
        self.details(id).await
    }

    /// pending -> rejected, no stock effect
    pub async fn reject(&self, id: i32, actor: &UserClaims) -> AppResult<RequestDetails> {
        let outcome = self.requests.reject(id, Utc::now()).await?;
        self.settle(id, outcome, RequestStatus::Rejected, NOT_PENDING)?;
        tracing::info!(request_id = id, actor_id = actor.user_id, "borrow request rejected");
        self.details(id).await
    }

    /// approved -> returned, putting the unit back on the shelf
    pub async fn return_equipment(&self, id: i32, actor: &UserClaims) -> AppResult<RequestDetails> {
        let outcome = self.requests.mark_returned(id, Utc::now()).await?;
        self.settle(id, outcome, RequestStatus::Returned, NOT_APPROVED)?;
        tracing::info!(request_id = id, actor_id = actor.user_id, "equipment returned");
        self.details(id).await
    }

    /// Students only ever see their own requests
    pub async fn list(&self, principal: &UserClaims, query: &RequestQuery) -> AppResult<Vec<RequestDetails>> {
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<RequestStatus>)
            .transpose()
            .map_err(AppError::BadRequest)?;

        let user_id = if principal.is_student() {
            Some(principal.user_id)
        } else {
            query.user
        };

        self.requests.list_details(RequestFilter { user_id, status }).await
    }

    /// Translate a store outcome into the caller-facing result
    fn settle(
        &self,
        id: i32,
        outcome: TransitionOutcome,
        target: RequestStatus,
        refused: &str,
    ) -> AppResult<()> {
        match outcome {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::Missing => Err(AppError::NotFound(refused.to_string())),
            TransitionOutcome::WrongState(current) => {
                tracing::debug!(request_id = id, %current, %target, "transition refused");
                Err(AppError::InvalidTransition(refused.to_string()))
            }
            TransitionOutcome::OutOfStock => Err(AppError::Unavailable("Equipment unavailable".to_string())),
            TransitionOutcome::StockOverflow => Err(AppError::Internal(format!(
                "returning request {} would exceed total quantity",
                id
            ))),
        }
    }

    async fn details(&self, id: i32) -> AppResult<RequestDetails> {
        self.requests
            .get_details(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("request {} vanished after write", id)))
    }
}
