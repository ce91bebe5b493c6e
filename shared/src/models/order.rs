//! Purchase order model and lifecycle
//!
//! The order status is never stored independently of the item counters: it
//! is recomputed with [`derive_status`] after every receipt.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{LocationId, OrderId, StockItemId};

/// Ceiling violations on order item counters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("receiving {requested} would exceed the ordered quantity: {received} of {ordered} already received")]
    ReceiptExceedsOrdered {
        ordered: i64,
        received: i64,
        requested: i64,
    },

    #[error("returning {requested} would exceed the received quantity: {returned} of {received} already returned")]
    ReturnExceedsReceived {
        received: i64,
        returned: i64,
        requested: i64,
    },
}

/// Purchase order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PartiallyReceived,
    Complete,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PartiallyReceived => "partially_received",
            OrderStatus::Complete => "complete",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "partially_received" => Some(OrderStatus::PartiallyReceived),
            "complete" => Some(OrderStatus::Complete),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Derive the status from the item counters. Complete when every line is
/// fully received, partially received when anything has arrived, otherwise
/// pending. Cancellation is not derived; it is a terminal state set once.
pub fn derive_status(items: &[OrderItem]) -> OrderStatus {
    if !items.is_empty() && items.iter().all(|i| i.received_qty == i.ordered_qty) {
        OrderStatus::Complete
    } else if items.iter().any(|i| i.received_qty > 0) {
        OrderStatus::PartiallyReceived
    } else {
        OrderStatus::Pending
    }
}

/// One order line with its ordered/received/returned counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub stock_item_id: StockItemId,
    /// Item name snapshot at order time, for display
    pub name: String,
    pub ordered_qty: i64,
    pub received_qty: i64,
    pub returned_qty: i64,
    /// Unit cost agreed at order time
    pub cost_price: Decimal,
}

impl OrderItem {
    pub fn new(stock_item_id: StockItemId, name: String, ordered_qty: i64, cost_price: Decimal) -> Self {
        Self {
            stock_item_id,
            name,
            ordered_qty,
            received_qty: 0,
            returned_qty: 0,
            cost_price,
        }
    }

    /// Quantity still expected from the vendor
    pub fn outstanding(&self) -> i64 {
        self.ordered_qty - self.received_qty
    }

    /// Count a received delivery against this line
    pub fn receive(&mut self, quantity: i64) -> Result<(), OrderError> {
        if self.received_qty + quantity > self.ordered_qty {
            return Err(OrderError::ReceiptExceedsOrdered {
                ordered: self.ordered_qty,
                received: self.received_qty,
                requested: quantity,
            });
        }
        self.received_qty += quantity;
        Ok(())
    }

    /// Count a vendor return against this line
    pub fn record_return(&mut self, quantity: i64) -> Result<(), OrderError> {
        if self.returned_qty + quantity > self.received_qty {
            return Err(OrderError::ReturnExceedsReceived {
                received: self.received_qty,
                returned: self.returned_qty,
                requested: quantity,
            });
        }
        self.returned_qty += quantity;
        Ok(())
    }
}

/// A payment recorded against an order; orthogonal to quantity state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub note: Option<String>,
}

/// A vendor purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockOrder {
    pub id: OrderId,
    /// Display id, e.g. "PO-2024-0001"
    pub order_number: String,
    pub vendor: String,
    /// Location deliveries against this order are received into
    pub location_id: LocationId,
    pub order_date: NaiveDate,
    pub payment_terms: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    /// Fixed at creation: sum of ordered quantity times cost price
    pub total_value: Decimal,
    pub amount_paid: Decimal,
    pub payment_history: Vec<PaymentEntry>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockOrder {
    /// Recompute the derived status; a cancelled order stays cancelled
    pub fn refresh_status(&mut self) {
        if self.status != OrderStatus::Cancelled {
            self.status = derive_status(&self.items);
        }
    }

    pub fn item(&self, stock_item_id: StockItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.stock_item_id == stock_item_id)
    }

    pub fn item_mut(&mut self, stock_item_id: StockItemId) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|i| i.stock_item_id == stock_item_id)
    }

    /// An order is cancellable only while pending with nothing received
    pub fn can_cancel(&self) -> bool {
        self.status == OrderStatus::Pending && self.items.iter().all(|i| i.received_qty == 0)
    }

    /// An order is deletable only while pending or after cancellation
    pub fn can_delete(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(ordered: i64, received: i64) -> OrderItem {
        OrderItem {
            stock_item_id: StockItemId::new(),
            name: "Widget".to_string(),
            ordered_qty: ordered,
            received_qty: received,
            returned_qty: 0,
            cost_price: Decimal::from(5),
        }
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(derive_status(&[item(100, 0), item(50, 0)]), OrderStatus::Pending);
        assert_eq!(derive_status(&[item(100, 60), item(50, 0)]), OrderStatus::PartiallyReceived);
        assert_eq!(derive_status(&[item(100, 100), item(50, 20)]), OrderStatus::PartiallyReceived);
        assert_eq!(derive_status(&[item(100, 100), item(50, 50)]), OrderStatus::Complete);
        assert_eq!(derive_status(&[]), OrderStatus::Pending);
    }

    #[test]
    fn test_receive_ceiling() {
        let mut line = item(100, 0);
        line.receive(60).unwrap();
        line.receive(40).unwrap();
        let err = line.receive(1).unwrap_err();
        assert!(matches!(err, OrderError::ReceiptExceedsOrdered { ordered: 100, received: 100, requested: 1 }));
    }

    #[test]
    fn test_return_ceiling() {
        let mut line = item(100, 60);
        line.record_return(60).unwrap();
        let err = line.record_return(1).unwrap_err();
        assert!(matches!(err, OrderError::ReturnExceedsReceived { received: 60, returned: 60, requested: 1 }));
    }

    #[test]
    fn test_cancelled_status_is_sticky() {
        let mut order = StockOrder {
            id: OrderId::new(),
            order_number: "PO-2024-0001".to_string(),
            vendor: "Acme".to_string(),
            location_id: LocationId::new(),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            payment_terms: None,
            status: OrderStatus::Cancelled,
            items: vec![item(10, 0)],
            total_value: Decimal::from(50),
            amount_paid: Decimal::ZERO,
            payment_history: vec![],
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        order.refresh_status();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_cancel_and_delete_rules() {
        let mut order = StockOrder {
            id: OrderId::new(),
            order_number: "PO-2024-0002".to_string(),
            vendor: "Acme".to_string(),
            location_id: LocationId::new(),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            payment_terms: None,
            status: OrderStatus::Pending,
            items: vec![item(10, 0)],
            total_value: Decimal::from(50),
            amount_paid: Decimal::ZERO,
            payment_history: vec![],
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(order.can_cancel());
        assert!(order.can_delete());

        order.items[0].receive(1).unwrap();
        order.refresh_status();
        assert!(!order.can_cancel());
        assert!(!order.can_delete());
    }
}
