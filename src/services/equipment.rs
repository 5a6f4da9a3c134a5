//! Equipment service

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::equipment::{CreateEquipment, Equipment, EquipmentDeletion, EquipmentQuery, EquipmentUpdate, UpdateEquipment},
    repository::EquipmentStore,
};

#[derive(Clone)]
pub struct EquipmentService {
    equipment: Arc<dyn EquipmentStore>,
}

impl EquipmentService {
    pub fn new(equipment: Arc<dyn EquipmentStore>) -> Self {
        Self { equipment }
    }

    pub async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        self.equipment.list(query).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        self.equipment
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Create equipment with every unit available
    pub async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        if data.name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        let equipment = self.equipment.create(data, Utc::now()).await?;
        tracing::info!(
            equipment_id = equipment.id,
            name = %equipment.name,
            total_quantity = equipment.total_quantity,
            "equipment created"
        );
        Ok(equipment)
    }

    pub async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        if data.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }
        if data.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }

        match self.equipment.update(id, data, Utc::now()).await? {
            EquipmentUpdate::Updated(equipment) => {
                tracing::info!(
                    equipment_id = id,
                    total_quantity = equipment.total_quantity,
                    available_count = equipment.available_count,
                    "equipment updated"
                );
                Ok(equipment)
            }
            EquipmentUpdate::Missing => Err(AppError::NotFound(format!("Equipment {} not found", id))),
            EquipmentUpdate::BelowOnLoan { on_loan } => Err(AppError::Validation(format!(
                "totalQuantity cannot be lower than the {} unit(s) currently on loan",
                on_loan
            ))),
        }
    }

    /// Delete equipment unless pending or approved requests reference it
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        match self.equipment.delete(id).await? {
            EquipmentDeletion::Deleted => {
                tracing::info!(equipment_id = id, "equipment deleted");
                Ok(())
            }
            EquipmentDeletion::Missing => Err(AppError::NotFound(format!("Equipment {} not found", id))),
            EquipmentDeletion::InUse { active_requests } => Err(AppError::Conflict(format!(
                "Equipment has {} active request(s)",
                active_requests
            ))),
        }
    }
}
