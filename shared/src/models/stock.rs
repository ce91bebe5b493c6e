//! Stock item, per-location stock and batch models
//!
//! Quantities only ever change through the mutators on [`LocationStock`],
//! which keep `total_stock` equal to the sum of batch quantities. Services
//! append the matching ledger movement in the same transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BatchId, LocationId, StockItemId};

/// Errors raised by batch-level quantity logic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    #[error("insufficient stock in batch {batch_number}: {available} available, {requested} requested")]
    InsufficientStock {
        batch_number: String,
        available: i64,
        requested: i64,
    },

    #[error("batch {batch_number} holds {available}, cannot return {requested}")]
    ReturnExceedsHolding {
        batch_number: String,
        available: i64,
        requested: i64,
    },

    #[error("batch {batch_number} has {returnable} still returnable, cannot return {requested}")]
    ReturnExceedsReceipt {
        batch_number: String,
        returnable: i64,
        requested: i64,
    },
}

/// A catalog entry shared across locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub id: StockItemId,
    pub name: String,
    /// Stock-keeping unit code, unique per catalog
    pub sku: String,
    pub category: Option<String>,
    /// Unit of measure label (e.g., "piece", "kg")
    pub unit: String,
    /// Opaque tax reference; tax computation is not this system's concern
    pub tax_code: Option<String>,
    /// Per-location stock, embedded with the item record
    pub location_stock: BTreeMap<LocationId, LocationStock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Stock held at a location, if any has ever been recorded there
    pub fn stock_at(&self, location_id: LocationId) -> Option<&LocationStock> {
        self.location_stock.get(&location_id)
    }

    /// Mutable stock at a location, created empty on first use
    pub fn stock_at_mut(&mut self, location_id: LocationId) -> &mut LocationStock {
        self.location_stock.entry(location_id).or_default()
    }

    /// Total quantity held at a location
    pub fn total_at(&self, location_id: LocationId) -> i64 {
        self.stock_at(location_id).map_or(0, LocationStock::total_stock)
    }
}

/// How a quantity entered a batch; only receipts from vendors raise the
/// vendor-return ceiling of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositKind {
    /// Opening stock recorded at item creation
    Opening,
    /// Delivery received against a purchase order
    Receipt,
    /// Stock arriving from another location
    TransferIn,
}

/// Stock of one item at one location: a keyed collection of batches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationStock {
    total_stock: i64,
    batches: BTreeMap<BatchId, StockBatch>,
}

impl LocationStock {
    /// Derived total, always equal to the sum of batch quantities
    pub fn total_stock(&self) -> i64 {
        self.total_stock
    }

    pub fn batch(&self, batch_id: BatchId) -> Option<&StockBatch> {
        self.batches.get(&batch_id)
    }

    pub fn batches(&self) -> impl Iterator<Item = &StockBatch> {
        self.batches.values()
    }

    /// Find a batch by its human-entered label. Exact, case-sensitive match;
    /// when several batches share the label the oldest id wins.
    pub fn find_batch_by_number(&self, batch_number: &str) -> Option<BatchId> {
        self.batches
            .values()
            .find(|b| b.batch_number == batch_number)
            .map(|b| b.id)
    }

    /// Add quantity into the batch matching `batch_number`, creating the
    /// batch if no label matches. Cost and sale price are overwritten with
    /// the supplied values (last write wins, see DESIGN notes), as is the
    /// expiry date when one is supplied.
    ///
    /// Returns the id of the batch that absorbed the quantity.
    pub fn deposit(
        &mut self,
        kind: DepositKind,
        batch_number: &str,
        expiry_date: Option<NaiveDate>,
        quantity: i64,
        cost_price: Decimal,
        sale_price: Decimal,
    ) -> BatchId {
        debug_assert!(quantity > 0, "deposits must be positive");

        let batch_id = self
            .find_batch_by_number(batch_number)
            .unwrap_or_else(BatchId::new);
        let batch = self.batches.entry(batch_id).or_insert_with(|| StockBatch {
            id: batch_id,
            batch_number: batch_number.to_string(),
            expiry_date: None,
            quantity: 0,
            cost_price,
            sale_price,
            received_qty: 0,
            returned_qty: 0,
        });
        batch.quantity += quantity;
        batch.cost_price = cost_price;
        batch.sale_price = sale_price;
        if expiry_date.is_some() {
            batch.expiry_date = expiry_date;
        }
        if kind == DepositKind::Receipt {
            batch.received_qty += quantity;
        }
        self.total_stock += quantity;

        batch_id
    }

    /// Remove quantity from a batch for a sale or a transfer out. The batch
    /// is retained at zero quantity for audit. Returns a snapshot of the
    /// batch after the withdrawal.
    pub fn withdraw(&mut self, batch_id: BatchId, quantity: i64) -> Result<StockBatch, StockError> {
        debug_assert!(quantity > 0, "withdrawals must be positive");

        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(StockError::BatchNotFound(batch_id))?;
        if quantity > batch.quantity {
            return Err(StockError::InsufficientStock {
                batch_number: batch.batch_number.clone(),
                available: batch.quantity,
                requested: quantity,
            });
        }

        batch.quantity -= quantity;
        let snapshot = batch.clone();
        self.total_stock -= quantity;
        Ok(snapshot)
    }

    /// Remove quantity for a vendor return. Bounded by what the batch still
    /// holds and by what was received into it and not yet returned; stock
    /// that arrived by transfer or as opening stock is never returnable.
    pub fn return_to_vendor(
        &mut self,
        batch_id: BatchId,
        quantity: i64,
    ) -> Result<StockBatch, StockError> {
        debug_assert!(quantity > 0, "returns must be positive");

        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(StockError::BatchNotFound(batch_id))?;
        if quantity > batch.quantity {
            return Err(StockError::ReturnExceedsHolding {
                batch_number: batch.batch_number.clone(),
                available: batch.quantity,
                requested: quantity,
            });
        }
        let returnable = batch.returnable();
        if quantity > returnable {
            return Err(StockError::ReturnExceedsReceipt {
                batch_number: batch.batch_number.clone(),
                returnable,
                requested: quantity,
            });
        }

        batch.quantity -= quantity;
        batch.returned_qty += quantity;
        let snapshot = batch.clone();
        self.total_stock -= quantity;
        Ok(snapshot)
    }

    /// Apply a signed stocktake correction to a batch. Returns a snapshot of
    /// the batch after the correction.
    pub fn adjust(&mut self, batch_id: BatchId, delta: i64) -> Result<StockBatch, StockError> {
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(StockError::BatchNotFound(batch_id))?;
        let new_quantity = batch.quantity + delta;
        if new_quantity < 0 {
            return Err(StockError::InsufficientStock {
                batch_number: batch.batch_number.clone(),
                available: batch.quantity,
                requested: -delta,
            });
        }

        batch.quantity = new_quantity;
        let snapshot = batch.clone();
        self.total_stock += delta;
        Ok(snapshot)
    }
}

/// A lot of one item at one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockBatch {
    /// Stable for the lot's lifetime, scoped to one location
    pub id: BatchId,
    /// Human label; may be empty or duplicated across lots
    pub batch_number: String,
    pub expiry_date: Option<NaiveDate>,
    quantity: i64,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    /// Cumulative quantity received into this batch from vendor deliveries
    received_qty: i64,
    /// Cumulative quantity sent back to vendors from this batch
    returned_qty: i64,
}

impl StockBatch {
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn received_qty(&self) -> i64 {
        self.received_qty
    }

    pub fn returned_qty(&self) -> i64 {
        self.returned_qty
    }

    /// Quantity still eligible for vendor return from this batch
    pub fn returnable(&self) -> i64 {
        self.received_qty - self.returned_qty
    }
}
