//! Receiving deliveries against a purchase order
//!
//! One call receives any number of items and batch deliveries atomically:
//! the order row is locked first, then every touched stock item in id
//! order, and a failed ceiling or stock check rolls the whole receipt back.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::{validation, DepositKind, MovementType, OrderId, StockItemId, StockMovement, StockOrder};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestContext;
use crate::services::{movements, orders, stock, tx};

/// One physical delivery into one batch
#[derive(Debug, Deserialize, Validate)]
pub struct BatchDeliveryInput {
    #[validate(range(min = 1, message = "Delivered quantity must be positive"))]
    pub quantity: i64,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    /// Matched against existing batch labels at the order's location;
    /// a new batch is created when no label matches
    #[validate(length(max = 64, message = "Batch number must be at most 64 characters"))]
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveLineInput {
    pub stock_item_id: StockItemId,
    #[validate]
    pub deliveries: Vec<BatchDeliveryInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveInput {
    #[validate]
    pub lines: Vec<ReceiveLineInput>,
}

#[derive(Clone)]
pub struct ReceivingService {
    db: PgPool,
}

impl ReceivingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Receive deliveries against an order. Every delivery lands at the
    /// order's location; the order's status is re-derived afterwards.
    pub async fn receive_order_items(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        input: ReceiveInput,
    ) -> AppResult<StockOrder> {
        input.validate()?;
        validation::validate_non_empty_lines(&input.lines)
            .map_err(|msg| AppError::validation("lines", msg))?;
        for line in &input.lines {
            validation::validate_non_empty_lines(&line.deliveries)
                .map_err(|msg| AppError::validation("deliveries", msg))?;
            for delivery in &line.deliveries {
                validation::validate_price(delivery.cost_price)
                    .map_err(|msg| AppError::validation("cost_price", msg))?;
                validation::validate_price(delivery.sale_price)
                    .map_err(|msg| AppError::validation("sale_price", msg))?;
            }
        }

        tx::with_retry("order receipt", || self.try_receive(ctx, order_id, &input)).await
    }

    async fn try_receive(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        input: &ReceiveInput,
    ) -> AppResult<StockOrder> {
        let mut tx = self.db.begin().await?;

        // Lock order first, then stock items in id order
        let mut order = orders::fetch_order_for_update(&mut tx, order_id).await?;
        if order.status == shared::OrderStatus::Cancelled {
            return Err(AppError::InvalidState(format!(
                "Order {} is cancelled and cannot receive deliveries",
                order.order_number
            )));
        }

        let item_ids: Vec<StockItemId> = input.lines.iter().map(|l| l.stock_item_id).collect();
        let mut items = stock::fetch_items_for_update(&mut tx, &item_ids).await?;

        let now = Utc::now();
        let mut ledger = Vec::new();

        for line in &input.lines {
            let order_item = orders::require_order_line(&mut order, line.stock_item_id)?;
            let line_total: i64 = line.deliveries.iter().map(|d| d.quantity).sum();
            order_item.receive(line_total)?;

            let item = items
                .get_mut(&line.stock_item_id)
                .ok_or_else(|| AppError::NotFound(format!("Stock item {}", line.stock_item_id)))?;
            let location_stock = item.stock_at_mut(order.location_id);

            for delivery in &line.deliveries {
                let batch_number = delivery.batch_number.as_deref().unwrap_or("");
                let batch_id = location_stock.deposit(
                    DepositKind::Receipt,
                    batch_number,
                    delivery.expiry_date,
                    delivery.quantity,
                    delivery.cost_price,
                    delivery.sale_price,
                );
                ledger.push(StockMovement {
                    id: Uuid::new_v4(),
                    stock_item_id: line.stock_item_id,
                    location_id: order.location_id,
                    batch_id,
                    batch_number: batch_number.to_string(),
                    movement_type: MovementType::Received,
                    quantity_change: delivery.quantity,
                    cost: Some(delivery.cost_price),
                    related_order_id: Some(order.id),
                    related_return_id: None,
                    related_transfer_id: None,
                    reason: None,
                    recorded_by: Some(ctx.user_id),
                    moved_at: now,
                });
            }
        }

        order.refresh_status();

        for item in items.values() {
            stock::store_location_stock(&mut tx, item).await?;
        }
        for movement in &ledger {
            movements::append_movement(&mut tx, movement).await?;
        }
        orders::store_order(&mut tx, &order).await?;

        tx.commit().await?;
        Ok(order)
    }
}
