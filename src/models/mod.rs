//! Data models for Equiplend

pub mod borrow_request;
pub mod equipment;
pub mod user;

// Re-export commonly used types
pub use borrow_request::{BorrowRequest, RequestDetails, RequestStatus, TransitionOutcome};
pub use equipment::{Equipment, EquipmentSummary};
pub use user::{Role, User, UserClaims};
