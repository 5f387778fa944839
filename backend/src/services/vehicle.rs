//! Vehicle registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::inventory::{apply_stock_delta, lock_item};
use crate::services::inventory_log::{self, LogEntry};
use shared::{plan_removal, validate_plate_number, LogAction, VehicleStatus};

#[derive(Clone)]
pub struct VehicleService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
    pub plate_number: String,
    pub vehicle_type: String,
    pub status: String,
    pub notes: Option<String>,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const VEHICLE_SELECT: &str = r#"
    SELECT v.id, v.name, v.plate_number, v.vehicle_type, v.status, v.notes,
           (SELECT COUNT(*) FROM vehicle_items vi WHERE vi.vehicle_id = v.id) AS item_count,
           v.created_at, v.updated_at
    FROM vehicles v
"#;

#[derive(Debug, Default, Deserialize)]
pub struct VehicleQuery {
    pub status: Option<VehicleStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub plate_number: String,
    #[validate(length(min = 1, max = 50))]
    pub vehicle_type: String,
    #[serde(default)]
    pub status: VehicleStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateVehicleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub plate_number: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub vehicle_type: Option<String>,
    pub status: Option<VehicleStatus>,
    pub notes: Option<String>,
}

/// Uppercase and check a plate number
fn normalize_plate(plate: &str) -> AppResult<String> {
    let plate = plate.trim().to_uppercase();
    validate_plate_number(&plate).map_err(|m| AppError::validation("plate_number", m))?;
    Ok(plate)
}

impl VehicleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_vehicles(&self, query: VehicleQuery) -> AppResult<Vec<Vehicle>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let vehicles = sqlx::query_as::<_, Vehicle>(&format!(
            r#"
            {VEHICLE_SELECT}
            WHERE ($1::text IS NULL OR v.status = $1)
              AND ($2::text IS NULL OR v.name ILIKE $2 OR v.plate_number ILIKE $2)
            ORDER BY v.name
            "#
        ))
        .bind(query.status.map(|s| s.as_str()))
        .bind(&search)
        .fetch_all(&self.db)
        .await?;

        Ok(vehicles)
    }

    pub async fn get_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vehicle> {
        sqlx::query_as::<_, Vehicle>(&format!("{VEHICLE_SELECT} WHERE v.id = $1"))
            .bind(vehicle_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle".to_string()))
    }

    pub async fn create_vehicle(&self, input: CreateVehicleInput) -> AppResult<Vehicle> {
        input.validate()?;
        let plate = normalize_plate(&input.plate_number)?;
        self.ensure_plate_free(&plate, None).await?;

        let vehicle_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO vehicles (name, plate_number, vehicle_type, status, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(&plate)
        .bind(input.vehicle_type.trim())
        .bind(input.status.as_str())
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(vehicle_id = %vehicle_id, plate = %plate, "Vehicle registered");
        self.get_vehicle(vehicle_id).await
    }

    pub async fn update_vehicle(&self, vehicle_id: Uuid, input: UpdateVehicleInput) -> AppResult<Vehicle> {
        input.validate()?;
        let plate = match &input.plate_number {
            Some(p) => {
                let plate = normalize_plate(p)?;
                self.ensure_plate_free(&plate, Some(vehicle_id)).await?;
                Some(plate)
            }
            None => None,
        };

        let updated = sqlx::query(
            r#"
            UPDATE vehicles SET
                name = COALESCE($2, name),
                plate_number = COALESCE($3, plate_number),
                vehicle_type = COALESCE($4, vehicle_type),
                status = COALESCE($5, status),
                notes = COALESCE($6, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(vehicle_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(plate)
        .bind(input.vehicle_type.as_deref().map(str::trim))
        .bind(input.status.map(|s| s.as_str()))
        .bind(&input.notes)
        .execute(&self.db)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Vehicle".to_string()));
        }

        self.get_vehicle(vehicle_id).await
    }

    /// Delete a vehicle, putting everything it carried back into stock
    pub async fn delete_vehicle(&self, user_id: Uuid, vehicle_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM vehicles WHERE id = $1 FOR UPDATE")
            .bind(vehicle_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Vehicle".to_string()));
        }

        let carried = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT inventory_id, quantity FROM vehicle_items WHERE vehicle_id = $1 ORDER BY inventory_id",
        )
        .bind(vehicle_id)
        .fetch_all(&mut *tx)
        .await?;

        for (inventory_id, assigned) in &carried {
            let (_, item_name) = lock_item(&mut tx, *inventory_id).await?;
            let movement = plan_removal(*assigned);
            let (previous, new_quantity) =
                apply_stock_delta(&mut tx, *inventory_id, movement.inventory_delta).await?;

            inventory_log::record(
                &mut *tx,
                LogEntry {
                    inventory_id: *inventory_id,
                    item_name: &item_name,
                    action: LogAction::ReturnedFromVehicle,
                    quantity_change: movement.inventory_delta,
                    previous_quantity: Some(previous),
                    new_quantity: Some(new_quantity),
                    vehicle_id: Some(vehicle_id),
                    performed_by: user_id,
                    notes: Some("Vehicle deleted"),
                },
            )
            .await?;
        }

        sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(vehicle_id = %vehicle_id, returned_items = carried.len(), "Vehicle deleted");
        Ok(())
    }

    async fn ensure_plate_free(&self, plate: &str, except: Option<Uuid>) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM vehicles WHERE plate_number = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(plate)
        .bind(except)
        .fetch_one(&self.db)
        .await?;
        if taken {
            return Err(AppError::DuplicateEntry("plate number".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_is_uppercased_before_validation() {
        assert_eq!(normalize_plate(" ab-123 ").unwrap(), "AB-123");
    }

    #[test]
    fn test_bad_plate_is_field_error() {
        assert!(matches!(
            normalize_plate("A"),
            Err(AppError::Validation { field, .. }) if field == "plate_number"
        ));
    }

    #[test]
    fn test_create_input_defaults_status() {
        let input: CreateVehicleInput = serde_json::from_str(
            r#"{"name":"Engine 1","plate_number":"FD-001","vehicle_type":"engine"}"#,
        )
        .unwrap();
        assert_eq!(input.status, VehicleStatus::Available);
    }
}
