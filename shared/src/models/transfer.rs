//! Inter-location stock transfer records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BatchId, LocationId, StockItemId, TransferId};

/// Transfer lifecycle state; reversal is the only permitted mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Reversed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Completed => "completed",
            TransferStatus::Reversed => "reversed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(TransferStatus::Completed),
            "reversed" => Some(TransferStatus::Reversed),
            _ => None,
        }
    }
}

/// One transferred line. Batch ids are location-scoped, so the same lot is
/// represented by two distinct batch records linked by `batch_number` and
/// this transfer line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLine {
    pub stock_item_id: StockItemId,
    /// Batch debited at the source location
    pub source_batch_id: BatchId,
    /// Batch credited at the destination location
    pub destination_batch_id: BatchId,
    pub batch_number: String,
    pub quantity: i64,
    pub cost_price_at_transfer: Decimal,
}

/// Stock moved between two locations, optionally reversed later
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransfer {
    pub id: TransferId,
    /// Display id, e.g. "TRF-2024-0001"
    pub transfer_number: String,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub items: Vec<TransferLine>,
    pub status: TransferStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}
