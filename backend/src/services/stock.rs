//! Stock item catalog and direct stock mutations
//!
//! Each stock item row embeds its per-location batch state as one JSONB
//! document. Mutations load the row under `FOR UPDATE`, apply the domain
//! logic in memory and write the document back together with the matching
//! ledger movement, all in one transaction.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use shared::{
    validation, BatchId, DepositKind, LocationId, LocationStock, MovementType, StockItem,
    StockItemId, StockMovement,
};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestContext;
use crate::services::{movements, tx};

#[derive(sqlx::FromRow)]
pub(crate) struct StockItemRow {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub unit: String,
    pub tax_code: Option<String>,
    pub location_stock: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<StockItemRow> for StockItem {
    type Error = AppError;

    fn try_from(row: StockItemRow) -> Result<Self, Self::Error> {
        let location_stock: BTreeMap<LocationId, LocationStock> =
            serde_json::from_value(row.location_stock)
                .map_err(|e| AppError::Internal(format!("corrupt location stock document: {e}")))?;
        Ok(StockItem {
            id: row.id.into(),
            name: row.name,
            sku: row.sku,
            category: row.category,
            unit: row.unit,
            tax_code: row.tax_code,
            location_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_ITEM: &str = r#"
    SELECT id, name, sku, category, unit, tax_code, location_stock, created_at, updated_at
    FROM stock_items
"#;

/// Load one stock item, locking its row for the rest of the transaction
pub(crate) async fn fetch_item_for_update(
    tx: &mut Transaction<'_, Postgres>,
    item_id: StockItemId,
) -> AppResult<StockItem> {
    let row = sqlx::query_as::<_, StockItemRow>(&format!("{SELECT_ITEM} WHERE id = $1 FOR UPDATE"))
        .bind(item_id.0)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock item {item_id}")))?;
    row.try_into()
}

/// Load several stock items under row locks. Rows are locked in id order so
/// concurrent multi-item transactions cannot deadlock each other.
pub(crate) async fn fetch_items_for_update(
    tx: &mut Transaction<'_, Postgres>,
    item_ids: &[StockItemId],
) -> AppResult<BTreeMap<StockItemId, StockItem>> {
    let mut ids: Vec<Uuid> = item_ids.iter().map(|id| id.0).collect();
    ids.sort();
    ids.dedup();

    let rows = sqlx::query_as::<_, StockItemRow>(&format!(
        "{SELECT_ITEM} WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(&ids)
    .fetch_all(&mut **tx)
    .await?;

    let mut items = BTreeMap::new();
    for row in rows {
        let item: StockItem = row.try_into()?;
        items.insert(item.id, item);
    }
    for id in item_ids {
        if !items.contains_key(id) {
            return Err(AppError::NotFound(format!("Stock item {id}")));
        }
    }
    Ok(items)
}

/// Write an item's batch document back; always paired with ledger appends in
/// the same transaction.
pub(crate) async fn store_location_stock(
    tx: &mut Transaction<'_, Postgres>,
    item: &StockItem,
) -> AppResult<()> {
    let document = serde_json::to_value(&item.location_stock)
        .map_err(|e| AppError::Internal(format!("failed to serialize location stock: {e}")))?;
    sqlx::query("UPDATE stock_items SET location_stock = $2, updated_at = now() WHERE id = $1")
        .bind(item.id.0)
        .bind(document)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Opening stock for one location, recorded at item creation
#[derive(Debug, Deserialize, Validate)]
pub struct OpeningStockLine {
    pub location_id: LocationId,
    #[validate(length(max = 64, message = "Batch number must be at most 64 characters"))]
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i64,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockItemInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Unit must be 1-32 characters"))]
    pub unit: String,
    pub tax_code: Option<String>,
    #[serde(default)]
    #[validate]
    pub opening_stock: Vec<OpeningStockLine>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockInput {
    /// Defaults to the caller's location
    pub location_id: Option<LocationId>,
    pub batch_id: BatchId,
    /// Signed correction; never zero
    pub delta: i64,
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordSaleInput {
    /// Defaults to the caller's location
    pub location_id: Option<LocationId>,
    pub batch_id: BatchId,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i64,
}

#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

impl StockService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a catalog entry, depositing any opening stock and writing one
    /// `initial` movement per opening line.
    pub async fn create_stock_item(
        &self,
        ctx: &RequestContext,
        input: CreateStockItemInput,
    ) -> AppResult<StockItem> {
        input.validate()?;
        validation::validate_sku(&input.sku).map_err(|msg| AppError::validation("sku", msg))?;
        for line in &input.opening_stock {
            validation::validate_price(line.cost_price)
                .map_err(|msg| AppError::validation("cost_price", msg))?;
            validation::validate_price(line.sale_price)
                .map_err(|msg| AppError::validation("sale_price", msg))?;
        }

        let mut tx = self.db.begin().await?;

        let sku_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stock_items WHERE sku = $1)")
                .bind(&input.sku)
                .fetch_one(&mut *tx)
                .await?;
        if sku_taken {
            return Err(AppError::validation("sku", "SKU is already in use"));
        }

        let now = Utc::now();
        let mut item = StockItem {
            id: StockItemId::new(),
            name: input.name,
            sku: input.sku,
            category: input.category,
            unit: input.unit,
            tax_code: input.tax_code,
            location_stock: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };

        let mut opening_movements = Vec::new();
        for line in &input.opening_stock {
            let batch_number = line.batch_number.as_deref().unwrap_or("");
            let batch_id = item.stock_at_mut(line.location_id).deposit(
                DepositKind::Opening,
                batch_number,
                line.expiry_date,
                line.quantity,
                line.cost_price,
                line.sale_price,
            );
            opening_movements.push(StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: item.id,
                location_id: line.location_id,
                batch_id,
                batch_number: batch_number.to_string(),
                movement_type: MovementType::Initial,
                quantity_change: line.quantity,
                cost: Some(line.cost_price),
                related_order_id: None,
                related_return_id: None,
                related_transfer_id: None,
                reason: None,
                recorded_by: Some(ctx.user_id),
                moved_at: now,
            });
        }

        let document = serde_json::to_value(&item.location_stock)
            .map_err(|e| AppError::Internal(format!("failed to serialize location stock: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO stock_items
                (id, name, sku, category, unit, tax_code, location_stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id.0)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(&item.category)
        .bind(&item.unit)
        .bind(&item.tax_code)
        .bind(document)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;

        for movement in &opening_movements {
            movements::append_movement(&mut tx, movement).await?;
        }

        tx.commit().await?;
        Ok(item)
    }

    pub async fn get_stock_item(&self, item_id: StockItemId) -> AppResult<StockItem> {
        let row = sqlx::query_as::<_, StockItemRow>(&format!("{SELECT_ITEM} WHERE id = $1"))
            .bind(item_id.0)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stock item {item_id}")))?;
        row.try_into()
    }

    pub async fn list_stock_items(&self) -> AppResult<Vec<StockItem>> {
        let rows = sqlx::query_as::<_, StockItemRow>(&format!("{SELECT_ITEM} ORDER BY name, id"))
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(StockItem::try_from).collect()
    }

    /// Apply a signed stocktake correction to one batch
    pub async fn adjust_stock(
        &self,
        ctx: &RequestContext,
        item_id: StockItemId,
        input: AdjustStockInput,
    ) -> AppResult<StockItem> {
        input.validate()?;
        validation::validate_nonzero_delta(input.delta)
            .map_err(|msg| AppError::validation("delta", msg))?;

        tx::with_retry("stock item", || self.try_adjust(ctx, item_id, &input)).await
    }

    async fn try_adjust(
        &self,
        ctx: &RequestContext,
        item_id: StockItemId,
        input: &AdjustStockInput,
    ) -> AppResult<StockItem> {
        let location_id = input.location_id.unwrap_or(ctx.location_id);
        let mut tx = self.db.begin().await?;

        let mut item = fetch_item_for_update(&mut tx, item_id).await?;
        let batch = item
            .stock_at_mut(location_id)
            .adjust(input.batch_id, input.delta)?;

        movements::append_movement(
            &mut tx,
            &StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: item.id,
                location_id,
                batch_id: batch.id,
                batch_number: batch.batch_number.clone(),
                movement_type: MovementType::Adjustment,
                quantity_change: input.delta,
                cost: None,
                related_order_id: None,
                related_return_id: None,
                related_transfer_id: None,
                reason: Some(input.reason.clone()),
                recorded_by: Some(ctx.user_id),
                moved_at: Utc::now(),
            },
        )
        .await?;

        store_location_stock(&mut tx, &item).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Record a point-of-sale withdrawal from one batch
    pub async fn record_sale(
        &self,
        ctx: &RequestContext,
        item_id: StockItemId,
        input: RecordSaleInput,
    ) -> AppResult<StockItem> {
        input.validate()?;
        tx::with_retry("stock item", || self.try_record_sale(ctx, item_id, &input)).await
    }

    async fn try_record_sale(
        &self,
        ctx: &RequestContext,
        item_id: StockItemId,
        input: &RecordSaleInput,
    ) -> AppResult<StockItem> {
        let location_id = input.location_id.unwrap_or(ctx.location_id);
        let mut tx = self.db.begin().await?;

        let mut item = fetch_item_for_update(&mut tx, item_id).await?;
        let batch = item
            .stock_at_mut(location_id)
            .withdraw(input.batch_id, input.quantity)?;

        movements::append_movement(
            &mut tx,
            &StockMovement {
                id: Uuid::new_v4(),
                stock_item_id: item.id,
                location_id,
                batch_id: batch.id,
                batch_number: batch.batch_number.clone(),
                movement_type: MovementType::Sale,
                quantity_change: -input.quantity,
                cost: None,
                related_order_id: None,
                related_return_id: None,
                related_transfer_id: None,
                reason: None,
                recorded_by: Some(ctx.user_id),
                moved_at: Utc::now(),
            },
        )
        .await?;

        store_location_stock(&mut tx, &item).await?;
        tx.commit().await?;
        Ok(item)
    }
}
