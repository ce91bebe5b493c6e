//! Inter-location stock transfers and their reversal
//!
//! A transfer debits batches at the source location and credits matching
//! batches at the destination in one transaction. Reversal replays the
//! lines in the opposite direction and is allowed once, provided the
//! destination still holds the transferred quantities.

use chrono::{Datelike, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::{
    validation, BatchId, DepositKind, LocationId, MovementType, StockItemId, StockMovement,
    StockTransfer, TransferId, TransferLine, TransferStatus,
};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestContext;
use crate::services::{movements, sequences, stock, tx};

#[derive(sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    transfer_number: String,
    from_location_id: Uuid,
    to_location_id: Uuid,
    items: serde_json::Value,
    status: String,
    created_by: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    reversed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<TransferRow> for StockTransfer {
    type Error = AppError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        let status = TransferStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(format!("unknown transfer status '{}'", row.status))
        })?;
        let items: Vec<TransferLine> = serde_json::from_value(row.items)
            .map_err(|e| AppError::Internal(format!("corrupt transfer items document: {e}")))?;
        Ok(StockTransfer {
            id: row.id.into(),
            transfer_number: row.transfer_number,
            from_location_id: row.from_location_id.into(),
            to_location_id: row.to_location_id.into(),
            items,
            status,
            created_by: row.created_by,
            created_at: row.created_at,
            reversed_at: row.reversed_at,
        })
    }
}

const SELECT_TRANSFER: &str = r#"
    SELECT id, transfer_number, from_location_id, to_location_id, items, status,
           created_by, created_at, reversed_at
    FROM stock_transfers
"#;

#[derive(Debug, Deserialize, Validate)]
pub struct TransferLineInput {
    pub stock_item_id: StockItemId,
    /// Batch to debit at the source location
    pub batch_id: BatchId,
    #[validate(range(min = 1, message = "Transfer quantity must be positive"))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferInput {
    /// Defaults to the caller's location
    pub from_location_id: Option<LocationId>,
    pub to_location_id: LocationId,
    #[validate]
    pub items: Vec<TransferLineInput>,
}

#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

impl TransferService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Move stock between two locations. The destination batch keeps the
    /// source batch's label, expiry and prices; quantities arriving by
    /// transfer never become vendor-returnable.
    pub async fn create_transfer(
        &self,
        ctx: &RequestContext,
        input: CreateTransferInput,
    ) -> AppResult<StockTransfer> {
        input.validate()?;
        validation::validate_non_empty_lines(&input.items)
            .map_err(|msg| AppError::validation("items", msg))?;
        let from_location_id = input.from_location_id.unwrap_or(ctx.location_id);
        validation::validate_distinct_locations(from_location_id, input.to_location_id)
            .map_err(|msg| AppError::validation("to_location_id", msg))?;

        tx::with_retry("stock transfer", || {
            self.try_create(ctx, from_location_id, &input)
        })
        .await
    }

    async fn try_create(
        &self,
        ctx: &RequestContext,
        from_location_id: LocationId,
        input: &CreateTransferInput,
    ) -> AppResult<StockTransfer> {
        let mut tx = self.db.begin().await?;

        let item_ids: Vec<StockItemId> = input.items.iter().map(|l| l.stock_item_id).collect();
        let mut items = stock::fetch_items_for_update(&mut tx, &item_ids).await?;

        let transfer_id = TransferId::new();
        let now = Utc::now();
        let mut lines = Vec::with_capacity(input.items.len());
        let mut ledger = Vec::with_capacity(input.items.len() * 2);

        for line in &input.items {
            let item = items
                .get_mut(&line.stock_item_id)
                .ok_or_else(|| AppError::NotFound(format!("Stock item {}", line.stock_item_id)))?;

            let source = item
                .stock_at_mut(from_location_id)
                .withdraw(line.batch_id, line.quantity)?;
            let destination_batch_id = item.stock_at_mut(input.to_location_id).deposit(
                DepositKind::TransferIn,
                &source.batch_number,
                source.expiry_date,
                line.quantity,
                source.cost_price,
                source.sale_price,
            );

            lines.push(TransferLine {
                stock_item_id: line.stock_item_id,
                source_batch_id: source.id,
                destination_batch_id,
                batch_number: source.batch_number.clone(),
                quantity: line.quantity,
                cost_price_at_transfer: source.cost_price,
            });
            ledger.push(StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: line.stock_item_id,
                location_id: from_location_id,
                batch_id: source.id,
                batch_number: source.batch_number.clone(),
                movement_type: MovementType::TransferOut,
                quantity_change: -line.quantity,
                cost: None,
                related_order_id: None,
                related_return_id: None,
                related_transfer_id: Some(transfer_id),
                reason: None,
                recorded_by: Some(ctx.user_id),
                moved_at: now,
            });
            ledger.push(StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: line.stock_item_id,
                location_id: input.to_location_id,
                batch_id: destination_batch_id,
                batch_number: source.batch_number,
                movement_type: MovementType::TransferIn,
                quantity_change: line.quantity,
                cost: None,
                related_order_id: None,
                related_return_id: None,
                related_transfer_id: Some(transfer_id),
                reason: None,
                recorded_by: Some(ctx.user_id),
                moved_at: now,
            });
        }

        let transfer = StockTransfer {
            id: transfer_id,
            transfer_number: sequences::next_document_number(&self.db, "TRF", now.year()).await?,
            from_location_id,
            to_location_id: input.to_location_id,
            items: lines,
            status: TransferStatus::Completed,
            created_by: Some(ctx.user_id),
            created_at: now,
            reversed_at: None,
        };

        let items_doc = serde_json::to_value(&transfer.items)
            .map_err(|e| AppError::Internal(format!("failed to serialize transfer items: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO stock_transfers
                (id, transfer_number, from_location_id, to_location_id, items, status,
                 created_by, created_at, reversed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)
            "#,
        )
        .bind(transfer.id.0)
        .bind(&transfer.transfer_number)
        .bind(transfer.from_location_id.0)
        .bind(transfer.to_location_id.0)
        .bind(items_doc)
        .bind(transfer.status.as_str())
        .bind(transfer.created_by)
        .bind(transfer.created_at)
        .execute(&mut *tx)
        .await?;

        for item in items.values() {
            stock::store_location_stock(&mut tx, item).await?;
        }
        for movement in &ledger {
            movements::append_movement(&mut tx, movement).await?;
        }

        tx.commit().await?;
        Ok(transfer)
    }

    /// Undo a completed transfer by replaying its lines in reverse. Fails
    /// if the destination already consumed any of the transferred stock.
    pub async fn reverse_transfer(
        &self,
        ctx: &RequestContext,
        transfer_id: TransferId,
    ) -> AppResult<StockTransfer> {
        tx::with_retry("stock transfer", || self.try_reverse(ctx, transfer_id)).await
    }

    async fn try_reverse(
        &self,
        ctx: &RequestContext,
        transfer_id: TransferId,
    ) -> AppResult<StockTransfer> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "{SELECT_TRANSFER} WHERE id = $1 FOR UPDATE"
        ))
        .bind(transfer_id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {transfer_id}")))?;
        let mut transfer: StockTransfer = row.try_into()?;

        if transfer.status != TransferStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Transfer {} has already been reversed",
                transfer.transfer_number
            )));
        }

        let item_ids: Vec<StockItemId> =
            transfer.items.iter().map(|l| l.stock_item_id).collect();
        let mut items = stock::fetch_items_for_update(&mut tx, &item_ids).await?;

        let now = Utc::now();
        let mut ledger = Vec::with_capacity(transfer.items.len() * 2);

        for line in &transfer.items {
            let item = items
                .get_mut(&line.stock_item_id)
                .ok_or_else(|| AppError::NotFound(format!("Stock item {}", line.stock_item_id)))?;

            item.stock_at_mut(transfer.to_location_id)
                .withdraw(line.destination_batch_id, line.quantity)?;
            // The source batch survives at zero quantity, so the original
            // record absorbs the returning stock without price changes
            item.stock_at_mut(transfer.from_location_id)
                .adjust(line.source_batch_id, line.quantity)?;

            ledger.push(StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: line.stock_item_id,
                location_id: transfer.to_location_id,
                batch_id: line.destination_batch_id,
                batch_number: line.batch_number.clone(),
                movement_type: MovementType::TransferReversal,
                quantity_change: -line.quantity,
                cost: None,
                related_order_id: None,
                related_return_id: None,
                related_transfer_id: Some(transfer.id),
                reason: None,
                recorded_by: Some(ctx.user_id),
                moved_at: now,
            });
            ledger.push(StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: line.stock_item_id,
                location_id: transfer.from_location_id,
                batch_id: line.source_batch_id,
                batch_number: line.batch_number.clone(),
                movement_type: MovementType::TransferReversal,
                quantity_change: line.quantity,
                cost: None,
                related_order_id: None,
                related_return_id: None,
                related_transfer_id: Some(transfer.id),
                reason: None,
                recorded_by: Some(ctx.user_id),
                moved_at: now,
            });
        }

        transfer.status = TransferStatus::Reversed;
        transfer.reversed_at = Some(now);
        sqlx::query("UPDATE stock_transfers SET status = $2, reversed_at = $3 WHERE id = $1")
            .bind(transfer.id.0)
            .bind(transfer.status.as_str())
            .bind(transfer.reversed_at)
            .execute(&mut *tx)
            .await?;

        for item in items.values() {
            stock::store_location_stock(&mut tx, item).await?;
        }
        for movement in &ledger {
            movements::append_movement(&mut tx, movement).await?;
        }

        tx.commit().await?;
        Ok(transfer)
    }

    pub async fn get_transfer(&self, transfer_id: TransferId) -> AppResult<StockTransfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!("{SELECT_TRANSFER} WHERE id = $1"))
            .bind(transfer_id.0)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transfer {transfer_id}")))?;
        row.try_into()
    }

    pub async fn list_transfers(&self) -> AppResult<Vec<StockTransfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            "{SELECT_TRANSFER} ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(StockTransfer::try_from).collect()
    }
}
