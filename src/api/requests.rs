//! Borrow request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::{AppError, AppResult},
    models::borrow_request::{CreateBorrowRequest, RequestDetails, RequestQuery},
};

use super::{AuthenticatedUser, Authorized, StaffOnly, StudentOnly};

/// Submit a borrow request (student)
#[utoipa::path(
    post,
    path = "/request",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowRequest,
    responses(
        (status = 201, description = "Request created", body = RequestDetails),
        (status = 400, description = "Equipment not available", body = crate::error::ErrorResponse),
        (status = 403, description = "Forbidden - insufficient role", body = crate::error::ErrorResponse),
        (status = 409, description = "Active request already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_request(
    State(state): State<crate::AppState>,
    Authorized { claims, .. }: Authorized<StudentOnly>,
    WithRejection(Json(data), _): WithRejection<Json<CreateBorrowRequest>, AppError>,
) -> AppResult<(StatusCode, Json<RequestDetails>)> {
    let request = state.services.requests.create(claims.user_id, &data).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// List borrow requests; students only see their own
#[utoipa::path(
    get,
    path = "/request",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(RequestQuery),
    responses(
        (status = 200, description = "Borrow requests", body = Vec<RequestDetails>),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<RequestQuery>, AppError>,
) -> AppResult<Json<Vec<RequestDetails>>> {
    let requests = state.services.requests.list(&claims, &query).await?;
    Ok(Json(requests))
}

/// Approve a pending request (staff, admin)
#[utoipa::path(
    patch,
    path = "/request/{id}/approve",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request approved", body = RequestDetails),
        (status = 400, description = "Equipment unavailable", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found or already processed", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_request(
    State(state): State<crate::AppState>,
    Authorized { claims, .. }: Authorized<StaffOnly>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, AppError>,
) -> AppResult<Json<RequestDetails>> {
    let request = state.services.requests.approve(id, &claims).await?;
    Ok(Json(request))
}

/// Reject a pending request (staff, admin)
#[utoipa::path(
    patch,
    path = "/request/{id}/reject",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request rejected", body = RequestDetails),
        (status = 404, description = "Request not found or already processed", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_request(
    State(state): State<crate::AppState>,
    Authorized { claims, .. }: Authorized<StaffOnly>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, AppError>,
) -> AppResult<Json<RequestDetails>> {
    let request = state.services.requests.reject(id, &claims).await?;
    Ok(Json(request))
}

/// Mark an approved request as returned (staff, admin)
#[utoipa::path(
    patch,
    path = "/request/{id}/return",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Equipment returned", body = RequestDetails),
        (status = 404, description = "Request not found or not approved", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_equipment(
    State(state): State<crate::AppState>,
    Authorized { claims, .. }: Authorized<StaffOnly>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, AppError>,
) -> AppResult<Json<RequestDetails>> {
    let request = state.services.requests.return_equipment(id, &claims).await?;
    Ok(Json(request))
}
