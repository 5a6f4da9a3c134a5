//! Business logic services

pub mod auth;
pub mod equipment;
pub mod requests;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub equipment: equipment::EquipmentService,
    pub requests: requests::RequestsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.users.clone(), auth_config),
            equipment: equipment::EquipmentService::new(repository.equipment.clone()),
            requests: requests::RequestsService::new(repository.equipment.clone(), repository.requests.clone()),
            repository,
        }
    }

    /// Readiness probe
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.repository.ping().await
    }
}
