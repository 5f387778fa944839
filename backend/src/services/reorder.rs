//! Reorder requests and their approval workflow

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::inventory::{apply_stock_delta, lock_item};
use crate::services::inventory_log::{self, LogEntry};
use shared::{LogAction, PaginatedData, Pagination, ReorderStatus};

#[derive(Clone)]
pub struct ReorderService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reorder {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub item_name: String,
    pub quantity: i32,
    pub status: String,
    pub supplier: Option<String>,
    pub estimated_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub requested_by: Option<Uuid>,
    pub processed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const REORDER_SELECT: &str = r#"
    SELECT r.id, r.inventory_id, i.item_name, r.quantity, r.status, r.supplier,
           r.estimated_cost, r.notes, r.requested_by, r.processed_by,
           r.created_at, r.updated_at
    FROM inventory_reorders r
    JOIN inventory i ON i.id = r.inventory_id
"#;

#[derive(Debug, Default, Deserialize)]
pub struct ReorderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<ReorderStatus>,
    pub inventory_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReorderInput {
    pub inventory_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    pub estimated_cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReorderStatusInput {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
    pub notes: Option<String>,
}

impl ReorderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: ReorderQuery) -> AppResult<PaginatedData<Reorder>> {
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(20),
        };
        let status = query.status.map(|s| s.as_str());

        let filter = r#"
            WHERE ($1::text IS NULL OR r.status = $1)
              AND ($2::uuid IS NULL OR r.inventory_id = $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM inventory_reorders r {filter}"
        ))
        .bind(status)
        .bind(query.inventory_id)
        .fetch_one(&self.db)
        .await?;

        let items = sqlx::query_as::<_, Reorder>(&format!(
            "{REORDER_SELECT} {filter} ORDER BY r.created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(query.inventory_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedData {
            items,
            pagination: pagination.meta(total),
        })
    }

    pub async fn get(&self, reorder_id: Uuid) -> AppResult<Reorder> {
        sqlx::query_as::<_, Reorder>(&format!("{REORDER_SELECT} WHERE r.id = $1"))
            .bind(reorder_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Reorder".to_string()))
    }

    pub async fn create(&self, user_id: Uuid, input: CreateReorderInput) -> AppResult<Reorder> {
        input.validate()?;
        if matches!(input.estimated_cost, Some(cost) if cost.is_sign_negative()) {
            return Err(AppError::validation(
                "estimated_cost",
                "Estimated cost cannot be negative",
            ));
        }

        let item_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM inventory WHERE id = $1)")
                .bind(input.inventory_id)
                .fetch_one(&self.db)
                .await?;
        if !item_exists {
            return Err(AppError::NotFound("Inventory item".to_string()));
        }

        let reorder_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO inventory_reorders (
                inventory_id, quantity, status, supplier, estimated_cost, notes, requested_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.inventory_id)
        .bind(input.quantity)
        .bind(ReorderStatus::Pending.as_str())
        .bind(&input.supplier)
        .bind(input.estimated_cost)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(reorder_id = %reorder_id, quantity = input.quantity, "Reorder requested");
        self.get(reorder_id).await
    }

    /// Advance a reorder through its workflow. Receipt books the quantity
    /// into stock in the same transaction.
    pub async fn update_status(
        &self,
        user_id: Uuid,
        reorder_id: Uuid,
        input: UpdateReorderStatusInput,
    ) -> AppResult<Reorder> {
        input.validate()?;
        let requested = ReorderStatus::from_str(input.status.trim())?;

        let mut tx = self.db.begin().await?;

        let (current, inventory_id, quantity) = sqlx::query_as::<_, (String, Uuid, i32)>(
            "SELECT status, inventory_id, quantity FROM inventory_reorders WHERE id = $1 FOR UPDATE",
        )
        .bind(reorder_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reorder".to_string()))?;

        let next = ReorderStatus::from_str(&current)?.transition(requested)?;

        sqlx::query(
            r#"
            UPDATE inventory_reorders
            SET status = $2, processed_by = $3, notes = COALESCE($4, notes), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(reorder_id)
        .bind(next.as_str())
        .bind(user_id)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        if next == ReorderStatus::Received {
            let (_, item_name) = lock_item(&mut tx, inventory_id).await?;
            let (previous, new_quantity) = apply_stock_delta(&mut tx, inventory_id, quantity).await?;
            let note = format!("Reorder {} received", reorder_id);

            inventory_log::record(
                &mut *tx,
                LogEntry {
                    inventory_id,
                    item_name: &item_name,
                    action: LogAction::ReorderReceived,
                    quantity_change: quantity,
                    previous_quantity: Some(previous),
                    new_quantity: Some(new_quantity),
                    vehicle_id: None,
                    performed_by: user_id,
                    notes: Some(&note),
                },
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(reorder_id = %reorder_id, from = %current, to = %next, "Reorder status changed");
        self.get(reorder_id).await
    }

    /// Withdraw a reorder nobody has acted on yet
    pub async fn delete(&self, reorder_id: Uuid) -> AppResult<()> {
        let reorder = self.get(reorder_id).await?;
        if reorder.status != ReorderStatus::Pending.as_str() {
            return Err(AppError::BadRequest(
                "Only pending reorders can be deleted".to_string(),
            ));
        }

        // The status may have moved on since the read above
        let deleted = sqlx::query("DELETE FROM inventory_reorders WHERE id = $1 AND status = $2")
            .bind(reorder_id)
            .bind(ReorderStatus::Pending.as_str())
            .execute(&self.db)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::BadRequest(
                "Only pending reorders can be deleted".to_string(),
            ));
        }

        tracing::info!(reorder_id = %reorder_id, "Reorder deleted");
        Ok(())
    }
}
