//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const DEFAULT_CONDITION: &str = "good";

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: i32,
    /// Unique name
    pub name: String,
    pub category: String,
    /// Free text, "good" unless stated otherwise
    pub condition: String,
    /// Units owned (at least 1)
    pub total_quantity: i32,
    /// Units on the shelf, between 0 and total_quantity
    pub available_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    pub fn is_available(&self) -> bool {
        self.available_count > 0
    }

    /// Units currently lent out
    pub fn on_loan(&self) -> i32 {
        self.total_quantity - self.available_count
    }
}

/// Create equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEquipment {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub condition: Option<String>,
    #[validate(range(min = 1, message = "totalQuantity must be at least 1"))]
    pub total_quantity: i32,
}

/// Update equipment request
///
/// `availableCount` is not accepted: it follows `totalQuantity` changes.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Category must not be empty"))]
    pub category: Option<String>,
    pub condition: Option<String>,
    #[validate(range(min = 1, message = "totalQuantity must be at least 1"))]
    pub total_quantity: Option<i32>,
}

impl UpdateEquipment {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.condition.is_none()
            && self.total_quantity.is_none()
    }
}

impl Equipment {
    /// Apply an update, shifting `available_count` by the change in
    /// `total_quantity` so the units on loan stay the same.
    ///
    /// Returns the number of units on loan when the new total is too small.
    pub fn apply_update(&self, data: &UpdateEquipment, now: DateTime<Utc>) -> Result<Equipment, i32> {
        let total_quantity = data.total_quantity.unwrap_or(self.total_quantity);
        let available_count = self.available_count + (total_quantity - self.total_quantity);
        if available_count < 0 {
            return Err(self.on_loan());
        }

        Ok(Equipment {
            id: self.id,
            name: data.name.as_ref().map(|n| n.trim().to_string()).unwrap_or_else(|| self.name.clone()),
            category: data.category.clone().unwrap_or_else(|| self.category.clone()),
            condition: data.condition.clone().unwrap_or_else(|| self.condition.clone()),
            total_quantity,
            available_count,
            created_at: self.created_at,
            updated_at: now,
        })
    }
}

/// Result of an equipment update at the store level
#[derive(Debug)]
pub enum EquipmentUpdate {
    Updated(Equipment),
    Missing,
    /// New total is lower than the number of units on loan
    BelowOnLoan { on_loan: i32 },
}

/// Result of an equipment deletion at the store level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentDeletion {
    Deleted,
    Missing,
    /// Pending or approved requests still reference the item
    InUse { active_requests: i64 },
}

/// Equipment list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct EquipmentQuery {
    /// Exact category match
    pub category: Option<String>,
    /// true: availableCount > 0, false: availableCount == 0
    pub available: Option<bool>,
}

impl EquipmentQuery {
    pub fn matches(&self, equipment: &Equipment) -> bool {
        if let Some(ref category) = self.category {
            if &equipment.category != category {
                return false;
            }
        }
        match self.available {
            Some(true) => equipment.available_count > 0,
            Some(false) => equipment.available_count == 0,
            None => true,
        }
    }
}

/// Equipment fields embedded in request listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EquipmentSummary {
    pub id: i32,
    pub name: String,
    pub category: String,
}

impl From<&Equipment> for EquipmentSummary {
    fn from(equipment: &Equipment) -> Self {
        Self {
            id: equipment.id,
            name: equipment.name.clone(),
            category: equipment.category.clone(),
        }
    }
}
