//! Vendor returns against previously received orders
//!
//! A return debits specific batches and is bounded three ways: by the order
//! line's received-minus-returned counter, by what the batch still holds,
//! and by what was actually received into the batch from vendor deliveries.

use chrono::{Datelike, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::{
    validation, BatchId, MovementType, ReturnId, ReturnLine, StockItemId, StockMovement,
    StockReturn,
};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestContext;
use crate::services::{movements, orders, sequences, stock, tx};

#[derive(sqlx::FromRow)]
struct ReturnRow {
    id: Uuid,
    return_number: String,
    vendor: String,
    related_order_id: Uuid,
    items: serde_json::Value,
    total_return_value: rust_decimal::Decimal,
    created_by: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ReturnRow> for StockReturn {
    type Error = AppError;

    fn try_from(row: ReturnRow) -> Result<Self, Self::Error> {
        let items: Vec<ReturnLine> = serde_json::from_value(row.items)
            .map_err(|e| AppError::Internal(format!("corrupt return items document: {e}")))?;
        Ok(StockReturn {
            id: row.id.into(),
            return_number: row.return_number,
            vendor: row.vendor,
            related_order_id: row.related_order_id.into(),
            items,
            total_return_value: row.total_return_value,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

const SELECT_RETURN: &str = r#"
    SELECT id, return_number, vendor, related_order_id, items, total_return_value,
           created_by, created_at
    FROM stock_returns
"#;

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnLineInput {
    pub stock_item_id: StockItemId,
    /// The batch the stock physically leaves from
    pub batch_id: BatchId,
    #[validate(range(min = 1, message = "Return quantity must be positive"))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReturnInput {
    /// Display id of the order the stock was received against
    #[validate(length(min = 1, message = "Related order number is required"))]
    pub related_order_number: String,
    #[validate]
    pub items: Vec<ReturnLineInput>,
}

#[derive(Clone)]
pub struct ReturnService {
    db: PgPool,
}

impl ReturnService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a vendor return. Stock leaves the related order's location;
    /// any ceiling violation rolls the whole return back.
    pub async fn create_return(
        &self,
        ctx: &RequestContext,
        input: CreateReturnInput,
    ) -> AppResult<StockReturn> {
        input.validate()?;
        validation::validate_non_empty_lines(&input.items)
            .map_err(|msg| AppError::validation("items", msg))?;

        tx::with_retry("vendor return", || self.try_create(ctx, &input)).await
    }

    async fn try_create(
        &self,
        ctx: &RequestContext,
        input: &CreateReturnInput,
    ) -> AppResult<StockReturn> {
        let mut tx = self.db.begin().await?;

        // Lock order first, then stock items in id order
        let mut order =
            orders::fetch_order_by_number_for_update(&mut tx, &input.related_order_number).await?;

        let item_ids: Vec<StockItemId> = input.items.iter().map(|l| l.stock_item_id).collect();
        let mut items = stock::fetch_items_for_update(&mut tx, &item_ids).await?;

        let return_id = ReturnId::new();
        let now = Utc::now();
        let mut lines = Vec::with_capacity(input.items.len());
        let mut ledger = Vec::with_capacity(input.items.len());

        for line in &input.items {
            let order_item = orders::require_order_line(&mut order, line.stock_item_id)?;
            order_item.record_return(line.quantity)?;

            let item = items
                .get_mut(&line.stock_item_id)
                .ok_or_else(|| AppError::NotFound(format!("Stock item {}", line.stock_item_id)))?;
            let batch = item
                .stock_at_mut(order.location_id)
                .return_to_vendor(line.batch_id, line.quantity)?;

            lines.push(ReturnLine {
                stock_item_id: line.stock_item_id,
                batch_id: batch.id,
                batch_number: batch.batch_number.clone(),
                quantity: line.quantity,
                cost_price_at_return: batch.cost_price,
            });
            ledger.push(StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: line.stock_item_id,
                location_id: order.location_id,
                batch_id: batch.id,
                batch_number: batch.batch_number,
                movement_type: MovementType::Return,
                quantity_change: -line.quantity,
                cost: None,
                related_order_id: None,
                related_return_id: Some(return_id),
                related_transfer_id: None,
                reason: None,
                recorded_by: Some(ctx.user_id),
                moved_at: now,
            });
        }

        let total_return_value = StockReturn::compute_total(&lines);
        let stock_return = StockReturn {
            id: return_id,
            return_number: sequences::next_document_number(&self.db, "RET", now.year()).await?,
            vendor: order.vendor.clone(),
            related_order_id: order.id,
            items: lines,
            total_return_value,
            created_by: Some(ctx.user_id),
            created_at: now,
        };

        let items_doc = serde_json::to_value(&stock_return.items)
            .map_err(|e| AppError::Internal(format!("failed to serialize return items: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO stock_returns
                (id, return_number, vendor, related_order_id, items, total_return_value,
                 created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(stock_return.id.0)
        .bind(&stock_return.return_number)
        .bind(&stock_return.vendor)
        .bind(stock_return.related_order_id.0)
        .bind(items_doc)
        .bind(stock_return.total_return_value)
        .bind(stock_return.created_by)
        .bind(stock_return.created_at)
        .execute(&mut *tx)
        .await?;

        for item in items.values() {
            stock::store_location_stock(&mut tx, item).await?;
        }
        for movement in &ledger {
            movements::append_movement(&mut tx, movement).await?;
        }
        orders::store_order(&mut tx, &order).await?;

        tx.commit().await?;
        Ok(stock_return)
    }

    pub async fn get_return(&self, return_id: ReturnId) -> AppResult<StockReturn> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!("{SELECT_RETURN} WHERE id = $1"))
            .bind(return_id.0)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Return {return_id}")))?;
        row.try_into()
    }

    pub async fn list_returns(&self) -> AppResult<Vec<StockReturn>> {
        let rows =
            sqlx::query_as::<_, ReturnRow>(&format!("{SELECT_RETURN} ORDER BY created_at DESC"))
                .fetch_all(&self.db)
                .await?;
        rows.into_iter().map(StockReturn::try_from).collect()
    }
}
