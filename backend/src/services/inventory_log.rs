//! Inventory audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use shared::{LogAction, PaginatedData, Pagination};

#[derive(Clone)]
pub struct InventoryLogService {
    db: PgPool,
}

/// One audit row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryLog {
    pub id: Uuid,
    pub inventory_id: Option<Uuid>,
    pub item_name: String,
    pub action: String,
    pub quantity_change: i32,
    pub previous_quantity: Option<i32>,
    pub new_quantity: Option<i32>,
    pub vehicle_id: Option<Uuid>,
    pub performed_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A log row about to be written
#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    pub inventory_id: Uuid,
    pub item_name: &'a str,
    pub action: LogAction,
    pub quantity_change: i32,
    pub previous_quantity: Option<i32>,
    pub new_quantity: Option<i32>,
    pub vehicle_id: Option<Uuid>,
    pub performed_by: Uuid,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub inventory_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub action: Option<LogAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Append a log row; runs on whatever executor the caller's transaction uses
pub async fn record<'e, E>(executor: E, entry: LogEntry<'_>) -> AppResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO inventory_logs (
            inventory_id, item_name, action, quantity_change, previous_quantity,
            new_quantity, vehicle_id, performed_by, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(entry.inventory_id)
    .bind(entry.item_name)
    .bind(entry.action.as_str())
    .bind(entry.quantity_change)
    .bind(entry.previous_quantity)
    .bind(entry.new_quantity)
    .bind(entry.vehicle_id)
    .bind(entry.performed_by)
    .bind(entry.notes)
    .execute(executor)
    .await?;
    Ok(())
}

impl InventoryLogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Newest first, filtered
    pub async fn list(&self, query: LogQuery) -> AppResult<PaginatedData<InventoryLog>> {
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(50),
        };
        let action = query.action.map(|a| a.as_str());

        let filter = r#"
            WHERE ($1::uuid IS NULL OR inventory_id = $1)
              AND ($2::uuid IS NULL OR vehicle_id = $2)
              AND ($3::text IS NULL OR action = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM inventory_logs {filter}"))
            .bind(query.inventory_id)
            .bind(query.vehicle_id)
            .bind(action)
            .bind(query.from)
            .bind(query.to)
            .fetch_one(&self.db)
            .await?;

        let items = sqlx::query_as::<_, InventoryLog>(&format!(
            r#"
            SELECT id, inventory_id, item_name, action, quantity_change, previous_quantity,
                   new_quantity, vehicle_id, performed_by, notes, created_at
            FROM inventory_logs
            {filter}
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(query.inventory_id)
        .bind(query.vehicle_id)
        .bind(action)
        .bind(query.from)
        .bind(query.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedData {
            items,
            pagination: pagination.meta(total),
        })
    }
}
