//! Purchase order lifecycle: creation, cancellation, deletion and payments
//!
//! Receiving against an order lives in [`crate::services::receiving`]; this
//! module owns everything that does not move stock.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use shared::{
    validation, LocationId, OrderId, OrderItem, OrderStatus, PaymentEntry, StockItemId, StockOrder,
};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestContext;
use crate::services::{sequences, tx};

#[derive(sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub vendor: String,
    pub location_id: Uuid,
    pub order_date: NaiveDate,
    pub payment_terms: Option<String>,
    pub status: String,
    pub items: serde_json::Value,
    pub total_value: Decimal,
    pub amount_paid: Decimal,
    pub payment_history: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<OrderRow> for StockOrder {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown order status '{}'", row.status)))?;
        let items: Vec<OrderItem> = serde_json::from_value(row.items)
            .map_err(|e| AppError::Internal(format!("corrupt order items document: {e}")))?;
        let payment_history: Vec<PaymentEntry> = serde_json::from_value(row.payment_history)
            .map_err(|e| AppError::Internal(format!("corrupt payment history document: {e}")))?;
        Ok(StockOrder {
            id: row.id.into(),
            order_number: row.order_number,
            vendor: row.vendor,
            location_id: row.location_id.into(),
            order_date: row.order_date,
            payment_terms: row.payment_terms,
            status,
            items,
            total_value: row.total_value,
            amount_paid: row.amount_paid,
            payment_history,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, order_number, vendor, location_id, order_date, payment_terms, status,
           items, total_value, amount_paid, payment_history, created_by, created_at, updated_at
    FROM stock_orders
"#;

/// Load one order, locking its row for the rest of the transaction
pub(crate) async fn fetch_order_for_update(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
) -> AppResult<StockOrder> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1 FOR UPDATE"))
        .bind(order_id.0)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id}")))?;
    row.try_into()
}

/// Load an order by its display id, locking its row
pub(crate) async fn fetch_order_by_number_for_update(
    tx: &mut Transaction<'_, Postgres>,
    order_number: &str,
) -> AppResult<StockOrder> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "{SELECT_ORDER} WHERE order_number = $1 FOR UPDATE"
    ))
    .bind(order_number)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {order_number}")))?;
    row.try_into()
}

/// Write the mutable part of an order back
pub(crate) async fn store_order(
    tx: &mut Transaction<'_, Postgres>,
    order: &StockOrder,
) -> AppResult<()> {
    let items = serde_json::to_value(&order.items)
        .map_err(|e| AppError::Internal(format!("failed to serialize order items: {e}")))?;
    let payment_history = serde_json::to_value(&order.payment_history)
        .map_err(|e| AppError::Internal(format!("failed to serialize payment history: {e}")))?;
    sqlx::query(
        r#"
        UPDATE stock_orders
        SET status = $2, items = $3, amount_paid = $4, payment_history = $5, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(order.id.0)
    .bind(order.status.as_str())
    .bind(items)
    .bind(payment_history)
    .bind(order.amount_paid)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Resolve an order line by stock item; an item the order never listed is
/// an unknown resource, not a malformed request
pub(crate) fn require_order_line(
    order: &mut StockOrder,
    stock_item_id: StockItemId,
) -> AppResult<&mut OrderItem> {
    let order_number = order.order_number.clone();
    order.item_mut(stock_item_id).ok_or_else(|| {
        AppError::NotFound(format!(
            "Stock item {stock_item_id} on order {order_number}"
        ))
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct OrderLineInput {
    pub stock_item_id: StockItemId,
    #[validate(range(min = 1, message = "Ordered quantity must be positive"))]
    pub ordered_qty: i64,
    pub cost_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, max = 200, message = "Vendor must be 1-200 characters"))]
    pub vendor: String,
    pub order_date: NaiveDate,
    /// Free-text terms, e.g. "net 30"
    pub payment_terms: Option<String>,
    /// Defaults to the caller's location
    pub location_id: Option<LocationId>,
    #[validate]
    pub items: Vec<OrderLineInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

impl OrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a pending order. Item names are snapshotted so later catalog
    /// renames do not rewrite order history.
    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        input: CreateOrderInput,
    ) -> AppResult<StockOrder> {
        input.validate()?;
        validation::validate_non_empty_lines(&input.items)
            .map_err(|msg| AppError::validation("items", msg))?;
        for line in &input.items {
            validation::validate_price(line.cost_price)
                .map_err(|msg| AppError::validation("cost_price", msg))?;
        }
        let mut seen = std::collections::BTreeSet::new();
        for line in &input.items {
            if !seen.insert(line.stock_item_id) {
                return Err(AppError::validation(
                    "items",
                    "Each stock item may appear on at most one order line",
                ));
            }
        }

        let mut tx = self.db.begin().await?;

        let ids: Vec<Uuid> = input.items.iter().map(|l| l.stock_item_id.0).collect();
        let names: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM stock_items WHERE id = ANY($1)")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let name = names
                .iter()
                .find(|(id, _)| *id == line.stock_item_id.0)
                .map(|(_, name)| name.clone())
                .ok_or_else(|| {
                    AppError::NotFound(format!("Stock item {}", line.stock_item_id))
                })?;
            items.push(OrderItem::new(
                line.stock_item_id,
                name,
                line.ordered_qty,
                line.cost_price,
            ));
        }

        let total_value: Decimal = items
            .iter()
            .map(|i| i.cost_price * Decimal::from(i.ordered_qty))
            .sum();

        let now = Utc::now();
        let order = StockOrder {
            id: OrderId::new(),
            order_number: sequences::next_document_number(&self.db, "PO", now.year()).await?,
            vendor: input.vendor,
            location_id: input.location_id.unwrap_or(ctx.location_id),
            order_date: input.order_date,
            payment_terms: input.payment_terms,
            status: OrderStatus::Pending,
            items,
            total_value,
            amount_paid: Decimal::ZERO,
            payment_history: Vec::new(),
            created_by: Some(ctx.user_id),
            created_at: now,
            updated_at: now,
        };

        let items_doc = serde_json::to_value(&order.items)
            .map_err(|e| AppError::Internal(format!("failed to serialize order items: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO stock_orders
                (id, order_number, vendor, location_id, order_date, payment_terms, status,
                 items, total_value, amount_paid, payment_history, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, '[]'::jsonb, $11, $12, $13)
            "#,
        )
        .bind(order.id.0)
        .bind(&order.order_number)
        .bind(&order.vendor)
        .bind(order.location_id.0)
        .bind(order.order_date)
        .bind(&order.payment_terms)
        .bind(order.status.as_str())
        .bind(items_doc)
        .bind(order.total_value)
        .bind(order.amount_paid)
        .bind(order.created_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> AppResult<StockOrder> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(order_id.0)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id}")))?;
        row.try_into()
    }

    pub async fn list_orders(&self) -> AppResult<Vec<StockOrder>> {
        let rows =
            sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} ORDER BY created_at DESC"))
                .fetch_all(&self.db)
                .await?;
        rows.into_iter().map(StockOrder::try_from).collect()
    }

    /// Cancel a pending order with nothing received against it
    pub async fn cancel_order(&self, order_id: OrderId) -> AppResult<StockOrder> {
        tx::with_retry("order", || self.try_cancel(order_id)).await
    }

    async fn try_cancel(&self, order_id: OrderId) -> AppResult<StockOrder> {
        let mut tx = self.db.begin().await?;

        let mut order = fetch_order_for_update(&mut tx, order_id).await?;
        if !order.can_cancel() {
            return Err(AppError::InvalidState(format!(
                "Order {} cannot be cancelled in status {}",
                order.order_number,
                order.status.as_str()
            )));
        }
        order.status = OrderStatus::Cancelled;
        store_order(&mut tx, &order).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Delete a pending or cancelled order. Orders that moved stock are kept
    /// forever because the ledger references them.
    pub async fn delete_order(&self, order_id: OrderId) -> AppResult<()> {
        tx::with_retry("order", || self.try_delete(order_id)).await
    }

    async fn try_delete(&self, order_id: OrderId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let order = fetch_order_for_update(&mut tx, order_id).await?;
        if !order.can_delete() {
            return Err(AppError::InvalidState(format!(
                "Order {} cannot be deleted in status {}",
                order.order_number,
                order.status.as_str()
            )));
        }
        sqlx::query("DELETE FROM stock_orders WHERE id = $1")
            .bind(order.id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record a payment against an order; orthogonal to quantity state
    pub async fn record_payment(
        &self,
        order_id: OrderId,
        input: RecordPaymentInput,
    ) -> AppResult<StockOrder> {
        input.validate()?;
        if input.amount <= Decimal::ZERO {
            return Err(AppError::validation("amount", "Payment amount must be positive"));
        }
        tx::with_retry("order", || self.try_record_payment(order_id, &input)).await
    }

    async fn try_record_payment(
        &self,
        order_id: OrderId,
        input: &RecordPaymentInput,
    ) -> AppResult<StockOrder> {
        let mut tx = self.db.begin().await?;

        let mut order = fetch_order_for_update(&mut tx, order_id).await?;
        order.amount_paid += input.amount;
        order.payment_history.push(PaymentEntry {
            amount: input.amount,
            paid_on: input.paid_on,
            note: input.note.clone(),
        });
        store_order(&mut tx, &order).await?;

        tx.commit().await?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_one_line(stock_item_id: StockItemId) -> StockOrder {
        let now = Utc::now();
        StockOrder {
            id: OrderId::new(),
            order_number: "PO-2024-0001".to_string(),
            vendor: "Acme Supply".to_string(),
            location_id: LocationId::new(),
            order_date: now.date_naive(),
            payment_terms: None,
            status: OrderStatus::Pending,
            items: vec![OrderItem::new(
                stock_item_id,
                "Widget".to_string(),
                10,
                Decimal::from(5),
            )],
            total_value: Decimal::from(50),
            amount_paid: Decimal::ZERO,
            payment_history: Vec::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn resolves_a_listed_order_line() {
        let listed = StockItemId::new();
        let mut order = order_with_one_line(listed);

        let line = require_order_line(&mut order, listed).unwrap();
        assert_eq!(line.stock_item_id, listed);
    }

    #[test]
    fn unlisted_item_is_not_found_rather_than_invalid_input() {
        let mut order = order_with_one_line(StockItemId::new());

        let err = require_order_line(&mut order, StockItemId::new()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
