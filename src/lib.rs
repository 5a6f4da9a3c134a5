//! Equiplend - School Equipment Lending Portal
//!
//! REST JSON API where students request equipment, staff approve, reject
//! and receive returns, and administrators manage the inventory.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Wire services over the given storage
    pub fn new(config: &AppConfig, repository: repository::Repository) -> Self {
        let services = services::Services::new(repository, config.auth.clone());
        Self {
            services: Arc::new(services),
        }
    }
}
