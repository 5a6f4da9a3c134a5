//! Repository layer for database operations
//!
//! Each store is a trait so the services run unchanged against PostgreSQL
//! or the in-memory backend. Lifecycle writes (`approve`, `reject`,
//! `mark_returned`) are compare-and-set primitives: the status check and
//! the stock mutation happen in one atomic step and report what they found
//! through [`TransitionOutcome`].

pub mod equipment;
pub mod memory;
pub mod requests;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        borrow_request::{BorrowRequest, NewBorrowRequest, RequestDetails, RequestFilter, TransitionOutcome},
        equipment::{CreateEquipment, Equipment, EquipmentDeletion, EquipmentQuery, EquipmentUpdate, UpdateEquipment},
        user::{NewUser, User},
    },
};

/// Identity store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `AccountExists` when the email is taken
    async fn create(&self, user: &NewUser) -> AppResult<User>;
}

/// Inventory store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EquipmentStore: Send + Sync {
    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>>;

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Equipment>>;

    /// Fails with `Conflict` when the name is taken
    async fn create(&self, data: &CreateEquipment, now: DateTime<Utc>) -> AppResult<Equipment>;

    async fn update(&self, id: i32, data: &UpdateEquipment, now: DateTime<Utc>) -> AppResult<EquipmentUpdate>;

    /// Deletes unless an active request still references the item
    async fn delete(&self, id: i32) -> AppResult<EquipmentDeletion>;
}

/// Request ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestsStore: Send + Sync {
    /// Pending or approved request for the pair, if any
    async fn find_active(&self, user_id: i32, equipment_id: i32) -> AppResult<Option<BorrowRequest>>;

    /// Fails with `Conflict` when an active request for the pair exists and
    /// with `Unavailable` when the equipment vanished
    async fn create(&self, request: &NewBorrowRequest) -> AppResult<BorrowRequest>;

    /// pending -> approved, taking one unit off the shelf
    async fn approve(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome>;

    /// pending -> rejected
    async fn reject(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome>;

    /// approved -> returned, putting the unit back
    async fn mark_returned(&self, id: i32, at: DateTime<Utc>) -> AppResult<TransitionOutcome>;

    async fn get_details(&self, id: i32) -> AppResult<Option<RequestDetails>>;

    /// Newest first
    async fn list_details(&self, filter: RequestFilter) -> AppResult<Vec<RequestDetails>>;
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub users: Arc<dyn UsersStore>,
    pub equipment: Arc<dyn EquipmentStore>,
    pub requests: Arc<dyn RequestsStore>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            equipment: Arc::new(equipment::EquipmentRepository::new(pool.clone())),
            requests: Arc::new(requests::RequestsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::new();
        Self::from_stores(Arc::new(store.clone()), Arc::new(store.clone()), Arc::new(store))
    }

    pub fn from_stores(
        users: Arc<dyn UsersStore>,
        equipment: Arc<dyn EquipmentStore>,
        requests: Arc<dyn RequestsStore>,
    ) -> Self {
        Self {
            pool: None,
            users,
            equipment,
            requests,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}
