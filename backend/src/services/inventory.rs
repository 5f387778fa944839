//! Inventory management service for stock items, adjustments and exports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::inventory_log::{self, LogEntry};
use shared::{plan_adjustment, LogAction, PaginatedData, Pagination};

/// Inventory service for managing stock items
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Stock item
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub item_name: String,
    pub category: String,
    pub quantity: i32,
    pub unit: String,
    pub min_quantity: i32,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
    pub is_low_stock: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const ITEM_COLUMNS: &str = "id, item_name, category, quantity, unit, min_quantity, \
     location, serial_number, notes, (quantity <= min_quantity) AS is_low_stock, \
     created_by, created_at, updated_at";

/// Flat row written to the CSV export
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    item_name: &'a str,
    category: &'a str,
    quantity: i32,
    unit: &'a str,
    min_quantity: i32,
    location: &'a str,
    serial_number: &'a str,
    low_stock: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub low_stock: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub item_name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[validate(range(min = 0))]
    pub min_quantity: Option<i32>,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
}

/// Descriptive changes; quantity only moves through adjustments and transfers
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub item_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[validate(range(min = 0))]
    pub min_quantity: Option<i32>,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockInput {
    pub delta: i32,
    #[validate(length(min = 1, max = 500, message = "A reason is required"))]
    pub reason: String,
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_items(&self, query: InventoryQuery) -> AppResult<PaginatedData<InventoryItem>> {
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(20),
        };
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let filter = r#"
            WHERE ($1::text IS NULL OR item_name ILIKE $1 OR serial_number ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::bool IS NULL OR (quantity <= min_quantity) = $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM inventory {filter}"))
            .bind(&search)
            .bind(&query.category)
            .bind(query.low_stock)
            .fetch_one(&self.db)
            .await?;

        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory {filter} ORDER BY item_name LIMIT $4 OFFSET $5"
        ))
        .bind(&search)
        .bind(&query.category)
        .bind(query.low_stock)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedData {
            items,
            pagination: pagination.meta(total),
        })
    }

    pub async fn get_item(&self, item_id: Uuid) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory WHERE id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))
    }

    pub async fn create_item(&self, user_id: Uuid, input: CreateItemInput) -> AppResult<InventoryItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            INSERT INTO inventory (
                item_name, category, quantity, unit, min_quantity, location,
                serial_number, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(input.item_name.trim())
        .bind(input.category.trim())
        .bind(input.quantity)
        .bind(input.unit.as_deref().unwrap_or("pcs"))
        .bind(input.min_quantity.unwrap_or(0))
        .bind(&input.location)
        .bind(&input.serial_number)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        inventory_log::record(
            &mut *tx,
            LogEntry {
                inventory_id: item.id,
                item_name: &item.item_name,
                action: LogAction::Created,
                quantity_change: item.quantity,
                previous_quantity: None,
                new_quantity: Some(item.quantity),
                vehicle_id: None,
                performed_by: user_id,
                notes: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(item_id = %item.id, "Inventory item created");
        Ok(item)
    }

    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory SET
                item_name = COALESCE($2, item_name),
                category = COALESCE($3, category),
                unit = COALESCE($4, unit),
                min_quantity = COALESCE($5, min_quantity),
                location = COALESCE($6, location),
                serial_number = COALESCE($7, serial_number),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(input.item_name.as_deref().map(str::trim))
        .bind(input.category.as_deref().map(str::trim))
        .bind(&input.unit)
        .bind(input.min_quantity)
        .bind(&input.location)
        .bind(&input.serial_number)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

        inventory_log::record(
            &mut *tx,
            LogEntry {
                inventory_id: item.id,
                item_name: &item.item_name,
                action: LogAction::Updated,
                quantity_change: 0,
                previous_quantity: Some(item.quantity),
                new_quantity: Some(item.quantity),
                vehicle_id: None,
                performed_by: user_id,
                notes: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Delete an item no vehicle carries
    pub async fn delete_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let item = self.get_item(item_id).await?;

        let assigned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM vehicle_items WHERE inventory_id = $1",
        )
        .bind(item_id)
        .fetch_one(&self.db)
        .await?;
        if assigned > 0 {
            return Err(AppError::BadRequest(
                "Item is assigned to vehicles; return it to stock first".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        inventory_log::record(
            &mut *tx,
            LogEntry {
                inventory_id: item.id,
                item_name: &item.item_name,
                action: LogAction::Deleted,
                quantity_change: -item.quantity,
                previous_quantity: Some(item.quantity),
                new_quantity: Some(0),
                vehicle_id: None,
                performed_by: user_id,
                notes: None,
            },
        )
        .await?;

        sqlx::query("DELETE FROM inventory WHERE id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(item_id = %item_id, "Inventory item deleted");
        Ok(())
    }

    /// Manual stock correction; never takes quantity below zero
    pub async fn adjust_stock(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let (previous, item_name) = lock_item(&mut tx, item_id).await?;

        let next = plan_adjustment(previous, input.delta)?;

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            "UPDATE inventory SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        inventory_log::record(
            &mut *tx,
            LogEntry {
                inventory_id: item_id,
                item_name: &item_name,
                action: LogAction::Adjusted,
                quantity_change: input.delta,
                previous_quantity: Some(previous),
                new_quantity: Some(next),
                vehicle_id: None,
                performed_by: user_id,
                notes: Some(input.reason.trim()),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(item_id = %item_id, previous, next, "Stock adjusted");
        Ok(item)
    }

    /// Items at or below their minimum quantity
    pub async fn low_stock(&self) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM inventory
            WHERE quantity <= min_quantity
            ORDER BY (min_quantity - quantity) DESC, item_name
            "#
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    /// Whole inventory as CSV
    pub async fn export_csv(&self) -> AppResult<String> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory ORDER BY category, item_name"
        ))
        .fetch_all(&self.db)
        .await?;
        Self::export_to_csv(&items)
    }

    pub fn export_to_csv(items: &[InventoryItem]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for item in items {
            wtr.serialize(ExportRow {
                item_name: &item.item_name,
                category: &item.category,
                quantity: item.quantity,
                unit: &item.unit,
                min_quantity: item.min_quantity,
                location: item.location.as_deref().unwrap_or(""),
                serial_number: item.serial_number.as_deref().unwrap_or(""),
                low_stock: if item.is_low_stock { "yes" } else { "no" },
            })
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

/// Move stock in or out of an item inside the caller's transaction, returning
/// the quantities before and after. The update refuses to go below zero even
/// if a concurrent transfer got there first.
pub(crate) async fn apply_stock_delta(
    conn: &mut sqlx::PgConnection,
    inventory_id: Uuid,
    delta: i32,
) -> AppResult<(i32, i32)> {
    let new_quantity = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE inventory
        SET quantity = quantity + $2, updated_at = NOW()
        WHERE id = $1 AND quantity + $2 >= 0
        RETURNING quantity
        "#,
    )
    .bind(inventory_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::InsufficientStock("Insufficient quantity in inventory".to_string()))?;

    Ok((new_quantity - delta, new_quantity))
}

/// Lock an item row for the rest of the transaction
pub(crate) async fn lock_item(
    conn: &mut sqlx::PgConnection,
    inventory_id: Uuid,
) -> AppResult<(i32, String)> {
    sqlx::query_as::<_, (i32, String)>(
        "SELECT quantity, item_name FROM inventory WHERE id = $1 FOR UPDATE",
    )
    .bind(inventory_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))
}
