//! Stock movement ledger entries
//!
//! A movement is an immutable fact recording one signed quantity change and
//! its cause. The sum of movements for a batch always equals that batch's
//! current quantity; this is the core auditability invariant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BatchId, LocationId, OrderId, ReturnId, StockItemId, TransferId};

/// Cause of a quantity change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Initial,
    Received,
    Sale,
    Adjustment,
    Return,
    TransferOut,
    TransferIn,
    TransferReversal,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Initial => "initial",
            MovementType::Received => "received",
            MovementType::Sale => "sale",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::TransferOut => "transfer_out",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferReversal => "transfer_reversal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(MovementType::Initial),
            "received" => Some(MovementType::Received),
            "sale" => Some(MovementType::Sale),
            "adjustment" => Some(MovementType::Adjustment),
            "return" => Some(MovementType::Return),
            "transfer_out" => Some(MovementType::TransferOut),
            "transfer_in" => Some(MovementType::TransferIn),
            "transfer_reversal" => Some(MovementType::TransferReversal),
            _ => None,
        }
    }
}

/// The transaction a movement originated from, when any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementRef {
    Order(OrderId),
    Return(ReturnId),
    Transfer(TransferId),
}

/// One immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub stock_item_id: StockItemId,
    pub location_id: LocationId,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub movement_type: MovementType,
    /// Signed change; positive for stock entering the location
    pub quantity_change: i64,
    /// Unit cost, recorded for received and initial movements
    pub cost: Option<Decimal>,
    pub related_order_id: Option<OrderId>,
    pub related_return_id: Option<ReturnId>,
    pub related_transfer_id: Option<TransferId>,
    /// Free-text reason, recorded for stocktake adjustments
    pub reason: Option<String>,
    /// Acting user, for audit attribution
    pub recorded_by: Option<Uuid>,
    pub moved_at: DateTime<Utc>,
}

impl StockMovement {
    /// The single related transaction, if the movement has one
    pub fn reference(&self) -> Option<MovementRef> {
        match (self.related_order_id, self.related_return_id, self.related_transfer_id) {
            (Some(order_id), None, None) => Some(MovementRef::Order(order_id)),
            (None, Some(return_id), None) => Some(MovementRef::Return(return_id)),
            (None, None, Some(transfer_id)) => Some(MovementRef::Transfer(transfer_id)),
            _ => None,
        }
    }
}
