//! Borrow request model and lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

use super::equipment::EquipmentSummary;

/// Request status
///
/// `pending -> approved -> returned`, `pending -> rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
}

impl RequestStatus {
    pub const ACTIVE: [RequestStatus; 2] = [RequestStatus::Pending, RequestStatus::Approved];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Returned => "returned",
        }
    }

    /// Pending or approved
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Approved, RequestStatus::Returned)
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "returned" => Ok(RequestStatus::Returned),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

// SQLx conversion for RequestStatus (stored as TEXT)
impl sqlx::Type<Postgres> for RequestStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for RequestStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: &str = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for RequestStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Borrow request row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub id: i32,
    pub user_id: i32,
    /// None once the equipment has been deleted (only for finished requests)
    pub equipment_id: Option<i32>,
    pub status: RequestStatus,
    pub borrow_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Borrower fields embedded in request listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowerSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
}

/// Borrow request with resolved user and equipment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub id: i32,
    pub status: RequestStatus,
    pub user: Option<BorrowerSummary>,
    pub equipment: Option<EquipmentSummary>,
    pub borrow_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestDetails {
    pub fn resolve(
        request: BorrowRequest,
        user: Option<BorrowerSummary>,
        equipment: Option<EquipmentSummary>,
    ) -> Self {
        Self {
            id: request.id,
            status: request.status,
            user,
            equipment,
            borrow_date: request.borrow_date,
            due_date: request.due_date,
            approved_at: request.approved_at,
            rejected_at: request.rejected_at,
            returned_at: request.returned_at,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Create request body (student)
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBorrowRequest {
    pub equipment_id: i32,
    /// Optional expected return date, must lie in the future
    pub due_date: Option<DateTime<Utc>>,
}

/// Insertable request
#[derive(Debug, Clone)]
pub struct NewBorrowRequest {
    pub user_id: i32,
    pub equipment_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Query string of GET /request
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct RequestQuery {
    /// Borrower id (ignored for students)
    pub user: Option<i32>,
    /// pending, approved, rejected or returned
    pub status: Option<String>,
}

/// Resolved filters applied by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub user_id: Option<i32>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn matches(&self, request: &BorrowRequest) -> bool {
        self.user_id.map_or(true, |id| request.user_id == id)
            && self.status.map_or(true, |s| request.status == s)
    }
}

/// Outcome of a compare-and-set status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// No request with this id
    Missing,
    /// Request exists in a state the transition does not start from
    WrongState(RequestStatus),
    /// Approval found no unit on the shelf
    OutOfStock,
    /// Return would push availableCount above totalQuantity
    StockOverflow,
}
