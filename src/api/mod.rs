//! API handlers for Equiplend REST endpoints

pub mod auth;
pub mod equipment;
pub mod health;
pub mod openapi;
pub mod requests;

use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, patch, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Authentication("Not authorized - no token provided".to_string()))?;

        let claims = state.services.auth.verify_token(token)?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Role policy checked by [`Authorized`]
pub trait RoleGate {
    fn check(claims: &UserClaims) -> Result<(), AppError>;
}

/// Administrators only
pub struct AdminOnly;

/// Staff and administrators
pub struct StaffOnly;

/// Students only
pub struct StudentOnly;

impl RoleGate for AdminOnly {
    fn check(claims: &UserClaims) -> Result<(), AppError> {
        claims.require_admin()
    }
}

impl RoleGate for StaffOnly {
    fn check(claims: &UserClaims) -> Result<(), AppError> {
        claims.require_staff()
    }
}

impl RoleGate for StudentOnly {
    fn check(claims: &UserClaims) -> Result<(), AppError> {
        claims.require_student()
    }
}

/// Authenticated user whose role passed `G`.
///
/// Runs with the other request-parts extractors, so the role is refused
/// before any body is read.
pub struct Authorized<G> {
    pub claims: UserClaims,
    _gate: PhantomData<fn() -> G>,
}

#[async_trait]
impl<G> FromRequestParts<AppState> for Authorized<G>
where
    G: RoleGate + Send + Sync + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        G::check(&claims)?;

        Ok(Authorized {
            claims,
            _gate: PhantomData,
        })
    }
}

/// Plain confirmation body
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Equipment
        .route(
            "/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route(
            "/equipment/:id",
            get(equipment::get_equipment)
                .put(equipment::update_equipment)
                .delete(equipment::delete_equipment),
        )
        // Borrow requests
        .route("/request", post(requests::create_request).get(requests::list_requests))
        .route("/request/:id/approve", patch(requests::approve_request))
        .route("/request/:id/reject", patch(requests::reject_request))
        .route("/request/:id/return", patch(requests::return_equipment))
        .with_state(state);

    Router::new()
        .route("/", get(health::banner))
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
