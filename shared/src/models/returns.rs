//! Vendor return records
//!
//! A return is immutable once created; corrections would be modeled as new
//! compensating transactions, never as edits to history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BatchId, OrderId, ReturnId, StockItemId};

/// One returned line, bound to the specific batch the stock came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLine {
    pub stock_item_id: StockItemId,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: i64,
    /// Batch cost at the moment of return; never recomputed later
    pub cost_price_at_return: Decimal,
}

/// Stock sent back to a vendor against a previously received order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReturn {
    pub id: ReturnId,
    /// Display id, e.g. "RET-2024-0001"
    pub return_number: String,
    pub vendor: String,
    pub related_order_id: OrderId,
    pub items: Vec<ReturnLine>,
    /// Sum of quantity times cost price at return
    pub total_return_value: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StockReturn {
    pub fn compute_total(items: &[ReturnLine]) -> Decimal {
        items
            .iter()
            .map(|line| line.cost_price_at_return * Decimal::from(line.quantity))
            .sum()
    }
}
