//! Stock carried on vehicles
//!
//! Assigning, resizing and removing an assignment each move stock between the
//! store room and the vehicle inside one transaction. The arithmetic comes
//! from `shared::stock`; this module locks rows, applies the plan and writes
//! the audit row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::inventory::{apply_stock_delta, lock_item};
use crate::services::inventory_log::{self, LogEntry};
use shared::{plan_assignment, plan_quantity_change, plan_removal, LogAction};

#[derive(Clone)]
pub struct VehicleItemService {
    db: PgPool,
}

/// An item as carried by a vehicle
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VehicleItem {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub inventory_id: Uuid,
    pub item_name: String,
    pub category: String,
    pub unit: String,
    pub quantity: i32,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignItemInput {
    pub inventory_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAssignmentInput {
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
}

impl VehicleItemService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_items(&self, vehicle_id: Uuid) -> AppResult<Vec<VehicleItem>> {
        ensure_vehicle(&self.db, vehicle_id).await?;

        let items = sqlx::query_as::<_, VehicleItem>(
            r#"
            SELECT vi.id, vi.vehicle_id, vi.inventory_id, i.item_name, i.category, i.unit,
                   vi.quantity, vi.assigned_by, vi.assigned_at, vi.updated_at
            FROM vehicle_items vi
            JOIN inventory i ON i.id = vi.inventory_id
            WHERE vi.vehicle_id = $1
            ORDER BY i.item_name
            "#,
        )
        .bind(vehicle_id)
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    /// Put stock on a vehicle. A second assignment of the same item adds to
    /// the existing one.
    pub async fn assign(
        &self,
        user_id: Uuid,
        vehicle_id: Uuid,
        input: AssignItemInput,
    ) -> AppResult<VehicleItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_vehicle(&mut tx, vehicle_id).await?;

        let (available, item_name) = lock_item(&mut tx, input.inventory_id).await?;
        let existing = assigned_quantity(&mut tx, vehicle_id, input.inventory_id).await?;
        let plan = plan_assignment(available, existing.unwrap_or(0), input.quantity)?;

        let (previous, new_quantity) =
            apply_stock_delta(&mut tx, input.inventory_id, plan.inventory_delta).await?;

        sqlx::query(
            r#"
            INSERT INTO vehicle_items (vehicle_id, inventory_id, quantity, assigned_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (vehicle_id, inventory_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(vehicle_id)
        .bind(input.inventory_id)
        .bind(plan.assigned_quantity)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        inventory_log::record(
            &mut *tx,
            LogEntry {
                inventory_id: input.inventory_id,
                item_name: &item_name,
                action: LogAction::AssignedToVehicle,
                quantity_change: plan.inventory_delta,
                previous_quantity: Some(previous),
                new_quantity: Some(new_quantity),
                vehicle_id: Some(vehicle_id),
                performed_by: user_id,
                notes: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            vehicle_id = %vehicle_id,
            inventory_id = %input.inventory_id,
            quantity = input.quantity,
            "Item assigned to vehicle"
        );
        self.get_item(vehicle_id, input.inventory_id).await
    }

    /// Set the carried quantity, moving the difference to or from stock
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        vehicle_id: Uuid,
        inventory_id: Uuid,
        input: UpdateAssignmentInput,
    ) -> AppResult<VehicleItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_vehicle(&mut tx, vehicle_id).await?;

        let (available, item_name) = lock_item(&mut tx, inventory_id).await?;
        let current = assigned_quantity(&mut tx, vehicle_id, inventory_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle item".to_string()))?;
        let plan = plan_quantity_change(available, current, input.quantity)?;

        if plan.inventory_delta != 0 {
            let (previous, new_quantity) =
                apply_stock_delta(&mut tx, inventory_id, plan.inventory_delta).await?;

            sqlx::query(
                r#"
                UPDATE vehicle_items SET quantity = $3, updated_at = NOW()
                WHERE vehicle_id = $1 AND inventory_id = $2
                "#,
            )
            .bind(vehicle_id)
            .bind(inventory_id)
            .bind(plan.assigned_quantity)
            .execute(&mut *tx)
            .await?;

            inventory_log::record(
                &mut *tx,
                LogEntry {
                    inventory_id,
                    item_name: &item_name,
                    action: LogAction::VehicleQuantityChanged,
                    quantity_change: plan.inventory_delta,
                    previous_quantity: Some(previous),
                    new_quantity: Some(new_quantity),
                    vehicle_id: Some(vehicle_id),
                    performed_by: user_id,
                    notes: None,
                },
            )
            .await?;
        }

        tx.commit().await?;
        self.get_item(vehicle_id, inventory_id).await
    }

    /// Take an item off a vehicle and return all of it to stock
    pub async fn remove(&self, user_id: Uuid, vehicle_id: Uuid, inventory_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        lock_vehicle(&mut tx, vehicle_id).await?;

        let (_, item_name) = lock_item(&mut tx, inventory_id).await?;
        let current = assigned_quantity(&mut tx, vehicle_id, inventory_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle item".to_string()))?;
        let plan = plan_removal(current);

        let (previous, new_quantity) =
            apply_stock_delta(&mut tx, inventory_id, plan.inventory_delta).await?;

        sqlx::query("DELETE FROM vehicle_items WHERE vehicle_id = $1 AND inventory_id = $2")
            .bind(vehicle_id)
            .bind(inventory_id)
            .execute(&mut *tx)
            .await?;

        inventory_log::record(
            &mut *tx,
            LogEntry {
                inventory_id,
                item_name: &item_name,
                action: LogAction::ReturnedFromVehicle,
                quantity_change: plan.inventory_delta,
                previous_quantity: Some(previous),
                new_quantity: Some(new_quantity),
                vehicle_id: Some(vehicle_id),
                performed_by: user_id,
                notes: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(vehicle_id = %vehicle_id, inventory_id = %inventory_id, "Item returned from vehicle");
        Ok(())
    }

    async fn get_item(&self, vehicle_id: Uuid, inventory_id: Uuid) -> AppResult<VehicleItem> {
        sqlx::query_as::<_, VehicleItem>(
            r#"
            SELECT vi.id, vi.vehicle_id, vi.inventory_id, i.item_name, i.category, i.unit,
                   vi.quantity, vi.assigned_by, vi.assigned_at, vi.updated_at
            FROM vehicle_items vi
            JOIN inventory i ON i.id = vi.inventory_id
            WHERE vi.vehicle_id = $1 AND vi.inventory_id = $2
            "#,
        )
        .bind(vehicle_id)
        .bind(inventory_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle item".to_string()))
    }
}

async fn ensure_vehicle<'e, E>(executor: E, vehicle_id: Uuid) -> AppResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM vehicles WHERE id = $1)")
        .bind(vehicle_id)
        .fetch_one(executor)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Vehicle".to_string()));
    }
    Ok(())
}

/// Share-lock the vehicle row. Taken before any item lock so the order
/// matches vehicle deletion, which locks the vehicle and then its items.
async fn lock_vehicle(conn: &mut PgConnection, vehicle_id: Uuid) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM vehicles WHERE id = $1 FOR SHARE")
        .bind(vehicle_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle".to_string()))?;
    Ok(())
}

async fn assigned_quantity(
    conn: &mut PgConnection,
    vehicle_id: Uuid,
    inventory_id: Uuid,
) -> AppResult<Option<i32>> {
    let quantity = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT quantity FROM vehicle_items
        WHERE vehicle_id = $1 AND inventory_id = $2
        FOR UPDATE
        "#,
    )
    .bind(vehicle_id)
    .bind(inventory_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(quantity)
}
