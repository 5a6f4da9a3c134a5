//! In-memory store
//!
//! Implements every store trait on one shared state. Each operation holds
//! the write lock for its whole read-check-write, which gives the lifecycle
//! primitives the same atomicity the PostgreSQL transactions provide.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{EquipmentStore, RequestsStore, UsersStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        borrow_request::{
            BorrowRequest, BorrowerSummary, NewBorrowRequest, RequestDetails, RequestFilter, RequestStatus,
            TransitionOutcome,
        },
        equipment::{
            CreateEquipment, Equipment, EquipmentDeletion, EquipmentQuery, EquipmentSummary, EquipmentUpdate,
            UpdateEquipment, DEFAULT_CONDITION,
        },
        user::{NewUser, User},
    },
};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i32, User>,
    equipment: BTreeMap<i32, Equipment>,
    requests: BTreeMap<i32, BorrowRequest>,
    next_user_id: i32,
    next_equipment_id: i32,
    next_request_id: i32,
}

impl MemoryState {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }

    fn details(&self, request: &BorrowRequest) -> RequestDetails {
        let user = self.users.get(&request.user_id).map(|u| BorrowerSummary {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        });
        let equipment = request
            .equipment_id
            .and_then(|id| self.equipment.get(&id))
            .map(EquipmentSummary::from);
        RequestDetails::resolve(request.clone(), user, equipment)
    }

    fn name_taken(&self, name: &str, except: Option<i32>) -> bool {
        self.equipment
            .values()
            .any(|e| e.name == name && Some(e.id) != except)
    }

    /// Check that the request may move to `to`, returning it for mutation
    fn expect_transition(
        &mut self,
        id: i32,
        to: RequestStatus,
    ) -> Result<&mut BorrowRequest, TransitionOutcome> {
        match self.requests.get_mut(&id) {
            None => Err(TransitionOutcome::Missing),
            Some(request) if !request.status.can_transition_to(to) => {
                Err(TransitionOutcome::WrongState(request.status))
            }
            Some(request) => Ok(request),
        }
    }

    fn equipment_of(&self, id: i32) -> Option<i32> {
        self.requests.get(&id).and_then(|r| r.equipment_id)
    }
}

/// Process-local store shared by clones
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsersStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AppError::AccountExists("User already exists".to_string()));
        }

        let id = MemoryState::next_id(&mut state.next_user_id);
        let created = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl EquipmentStore for MemoryStore {
    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let state = self.state.read().await;
        let mut rows: Vec<Equipment> = state
            .equipment
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Equipment>> {
        Ok(self.state.read().await.equipment.get(&id).cloned())
    }

    async fn create(&self, data: &CreateEquipment, now: DateTime<Utc>) -> AppResult<Equipment> {
        let mut state = self.state.write().await;
        let name = data.name.trim();
        if state.name_taken(name, None) {
            return Err(AppError::Conflict("Equipment with this name already exists".to_string()));
        }

        let id = MemoryState::next_id(&mut state.next_equipment_id);
        let created = Equipment {
            id,
            name: name.to_string(),
            category: data.category.clone(),
            condition: data.condition.clone().unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
            total_quantity: data.total_quantity,
            available_count: data.total_quantity,
            created_at: now,
            updated_at: now,
        };
        state.equipment.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, data: &UpdateEquipment, now: DateTime<Utc>) -> AppResult<EquipmentUpdate> {
        let mut state = self.state.write().await;
        let Some(current) = state.equipment.get(&id) else {
            return Ok(EquipmentUpdate::Missing);
        };

        let next = match current.apply_update(data, now) {
            Ok(next) => next,
            Err(on_loan) => return Ok(EquipmentUpdate::BelowOnLoan { on_loan }),
        };
        if state.name_taken(&next.name, Some(id)) {
            return Err(AppError::Conflict("Equipment with this name already exists".to_string()));
        }

        state.equipment.insert(id, next.clone());
        Ok(EquipmentUpdate::Updated(next))
    }

    async fn delete(&self, id: i32) -> AppResult<EquipmentDeletion> {
        let mut state = self.state.write().await;
        if !state.equipment.contains_key(&id) {
            return Ok(EquipmentDeletion::Missing);
        }

        let active_requests = state
            .requests
            .values()
            .filter(|r| r.equipment_id == Some(id) && r.status.is_active())
            .count() as i64;
        if active_requests > 0 {
            return Ok(EquipmentDeletion::InUse { active_requests });
        }

        state.equipment.remove(&id);
        for request in state.requests.values_mut() {
            if request.equipment_id == Some(id) {
                request.equipment_id = None;
            }
        }
        Ok(EquipmentDeletion::Deleted)
    }
}

#[async_trait]
impl RequestsStore for MemoryStore {
    async fn find_active(&self, user_id: i32, equipment_id: i32) -> AppResult<Option<BorrowRequest>> {
        let state = self.state.read().await;
        Ok(state
            .requests
            .values()
            .find(|r| r.user_id == user_id && r.equipment_id == Some(equipment_id) && r.status.is_active())
            .cloned())
    }

    async fn create(&self, request: &NewBorrowRequest) -> AppResult<BorrowRequest> {
        let mut state = self.state.write().await;
        if !state.equipment.contains_key(&request.equipment_id) {
            return Err(AppError::Unavailable("Equipment not available".to_string()));
        }
        let duplicate = state.requests.values().any(|r| {
            r.user_id == request.user_id && r.equipment_id == Some(request.equipment_id) && r.status.is_active()
        });
        if duplicate {
            return Err(AppError::Conflict(
                "Active request already exists for this equipment".to_string(),
            ));
        }

        let id = MemoryState::next_id(&mut state.next_request_id);
        let created = BorrowRequest {
            id,
            user_id: request.user_id,
            equipment_id: Some(request.equipment_id),
            status: RequestStatus::Pending,
            borrow_date: request.borrow_date,
            due_date: request.due_date,
            approved_at: None,
            rejected_at: None,
            returned_at: None,
            created_at: request.borrow_date,
            updated_at: request.borrow_date,
        };
        state.requests.insert(id, created.clone());
        Ok(created)
    }

    async fn approve(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome> {
        let mut state = self.state.write().await;
        if let Err(outcome) = state.expect_transition(id, RequestStatus::Approved) {
            return Ok(outcome);
        }

        let Some(equipment_id) = state.equipment_of(id) else {
            return Ok(TransitionOutcome::OutOfStock);
        };
        let Some(equipment) = state.equipment.get_mut(&equipment_id) else {
            return Ok(TransitionOutcome::OutOfStock);
        };
        if equipment.available_count <= 0 {
            return Ok(TransitionOutcome::OutOfStock);
        }
        equipment.available_count -= 1;
        equipment.updated_at = at;

        if let Ok(request) = state.expect_transition(id, RequestStatus::Approved) {
            request.status = RequestStatus::Approved;
            request.approved_at = Some(at);
            request.updated_at = at;
        }
        Ok(TransitionOutcome::Applied)
    }

    async fn reject(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome> {
        let mut state = self.state.write().await;
        match state.expect_transition(id, RequestStatus::Rejected) {
            Ok(request) => {
                request.status = RequestStatus::Rejected;
                request.rejected_at = Some(at);
                request.updated_at = at;
                Ok(TransitionOutcome::Applied)
            }
            Err(outcome) => Ok(outcome),
        }
    }

    async fn mark_returned(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome> {
        let mut state = self.state.write().await;
        if let Err(outcome) = state.expect_transition(id, RequestStatus::Returned) {
            return Ok(outcome);
        }

        let Some(equipment_id) = state.equipment_of(id) else {
            return Ok(TransitionOutcome::StockOverflow);
        };
        let Some(equipment) = state.equipment.get_mut(&equipment_id) else {
            return Ok(TransitionOutcome::StockOverflow);
        };
        if equipment.available_count >= equipment.total_quantity {
            return Ok(TransitionOutcome::StockOverflow);
        }
        equipment.available_count += 1;
        equipment.updated_at = at;

        if let Ok(request) = state.expect_transition(id, RequestStatus::Returned) {
            request.status = RequestStatus::Returned;
            request.returned_at = Some(at);
            request.updated_at = at;
        }
        Ok(TransitionOutcome::Applied)
    }

    async fn get_details(&self, id: i32) -> AppResult<Option<RequestDetails>> {
        let state = self.state.read().await;
        Ok(state.requests.get(&id).map(|r| state.details(r)))
    }

    async fn list_details(&self, filter: RequestFilter) -> AppResult<Vec<RequestDetails>> {
        let state = self.state.read().await;
        // ids grow with creation time, so reverse id order is newest first
        Ok(state
            .requests
            .values()
            .rev()
            .filter(|r| filter.matches(r))
            .map(|r| state.details(r))
            .collect())
    }
}
