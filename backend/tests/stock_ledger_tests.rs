//! Batch store and movement ledger tests
//!
//! Covers the core bookkeeping properties:
//! - Conservation: a batch's quantity always equals the sum of its movements
//! - No negative stock: no operation drives a batch below zero
//! - Return ceilings: holdings and receipts both bound vendor returns

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

use shared::{BatchId, DepositKind, LocationStock, StockBatch, StockError};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn conservation_holds(stock: &LocationStock) -> bool {
    stock.total_stock() == stock.batches().map(StockBatch::quantity).sum::<i64>()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Repeated receipts into the same label accumulate in one batch
    #[test]
    fn test_receipts_accumulate_by_label() {
        let mut stock = LocationStock::default();
        let b1 = stock.deposit(DepositKind::Receipt, "B1", None, 60, dec("5"), dec("8"));
        let again = stock.deposit(DepositKind::Receipt, "B1", None, 40, dec("6"), dec("9"));

        assert_eq!(b1, again);
        assert_eq!(stock.total_stock(), 100);
        assert_eq!(stock.batch(b1).unwrap().quantity(), 100);
    }

    /// Re-receiving into an existing label overwrites prices, last write wins
    #[test]
    fn test_re_receipt_overwrites_prices() {
        let mut stock = LocationStock::default();
        let b1 = stock.deposit(DepositKind::Receipt, "B1", None, 60, dec("5"), dec("8"));
        stock.deposit(DepositKind::Receipt, "B1", None, 40, dec("6"), dec("9"));

        let batch = stock.batch(b1).unwrap();
        assert_eq!(batch.cost_price, dec("6"));
        assert_eq!(batch.sale_price, dec("9"));
    }

    /// An emptied batch stays on the books at zero quantity
    #[test]
    fn test_emptied_batch_is_retained() {
        let mut stock = LocationStock::default();
        let b1 = stock.deposit(DepositKind::Receipt, "B1", None, 30, dec("5"), dec("8"));
        stock.withdraw(b1, 30).unwrap();

        assert_eq!(stock.batch(b1).unwrap().quantity(), 0);
        assert_eq!(stock.total_stock(), 0);
        assert!(conservation_holds(&stock));
    }

    /// Withdrawing more than a batch holds fails and changes nothing
    #[test]
    fn test_no_negative_stock() {
        let mut stock = LocationStock::default();
        let b1 = stock.deposit(DepositKind::Receipt, "B1", None, 30, dec("5"), dec("8"));

        let err = stock.withdraw(b1, 31).unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { .. }));
        assert_eq!(stock.batch(b1).unwrap().quantity(), 30);
        assert!(conservation_holds(&stock));
    }

    /// Stock that arrived by transfer or as opening stock is not returnable
    #[test]
    fn test_only_received_stock_is_returnable() {
        let mut stock = LocationStock::default();
        let opening = stock.deposit(DepositKind::Opening, "B1", None, 20, dec("5"), dec("8"));
        let incoming = stock.deposit(DepositKind::TransferIn, "B2", None, 20, dec("5"), dec("8"));

        assert!(matches!(
            stock.return_to_vendor(opening, 1),
            Err(StockError::ReturnExceedsReceipt { returnable: 0, .. })
        ));
        assert!(matches!(
            stock.return_to_vendor(incoming, 1),
            Err(StockError::ReturnExceedsReceipt { returnable: 0, .. })
        ));
    }

    /// Scenario: receive 60 into B1 and 40 into B2, return from B1, then
    /// overdraw the batch return ceiling
    #[test]
    fn test_receive_then_return_scenario() {
        let mut stock = LocationStock::default();
        let b1 = stock.deposit(DepositKind::Receipt, "B1", None, 60, dec("5"), dec("8"));
        stock.deposit(DepositKind::Receipt, "B2", None, 40, dec("6"), dec("9"));
        assert_eq!(stock.total_stock(), 100);

        stock.return_to_vendor(b1, 10).unwrap();
        assert_eq!(stock.batch(b1).unwrap().quantity(), 50);
        assert_eq!(stock.total_stock(), 90);

        // Only 50 remain in B1
        let err = stock.return_to_vendor(b1, 51).unwrap_err();
        assert!(matches!(
            err,
            StockError::ReturnExceedsHolding { available: 50, requested: 51, .. }
        ));
        assert_eq!(stock.total_stock(), 90);
    }

    /// Adjustments move stock both ways and record against the right batch
    #[test]
    fn test_adjustment_directions() {
        let mut stock = LocationStock::default();
        let b1 = stock.deposit(DepositKind::Receipt, "B1", None, 10, dec("5"), dec("8"));

        assert_eq!(stock.adjust(b1, 4).unwrap().quantity(), 14);
        assert_eq!(stock.adjust(b1, -14).unwrap().quantity(), 0);
        assert!(matches!(
            stock.adjust(b1, -1),
            Err(StockError::InsufficientStock { .. })
        ));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        Deposit { label: u8, kind: DepositKind, quantity: i64 },
        Withdraw { batch_index: usize, quantity: i64 },
        Return { batch_index: usize, quantity: i64 },
        Adjust { batch_index: usize, delta: i64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, 1i64..500, 0u8..3).prop_map(|(label, quantity, kind)| Op::Deposit {
                label,
                kind: match kind {
                    0 => DepositKind::Opening,
                    1 => DepositKind::Receipt,
                    _ => DepositKind::TransferIn,
                },
                quantity,
            }),
            (0usize..4, 1i64..500).prop_map(|(batch_index, quantity)| Op::Withdraw {
                batch_index,
                quantity
            }),
            (0usize..4, 1i64..500).prop_map(|(batch_index, quantity)| Op::Return {
                batch_index,
                quantity
            }),
            (0usize..4, -500i64..500).prop_map(|(batch_index, delta)| Op::Adjust {
                batch_index,
                delta
            }),
        ]
    }

    /// Apply an op, logging the signed change on success as the services
    /// would append a ledger movement
    fn apply(stock: &mut LocationStock, log: &mut Vec<(BatchId, i64)>, op: Op) {
        let known: Vec<BatchId> = stock.batches().map(|b| b.id).collect();
        let pick = |index: usize| known.get(index % known.len().max(1)).copied();

        match op {
            Op::Deposit { label, kind, quantity } => {
                let batch_id = stock.deposit(
                    kind,
                    &format!("B{label}"),
                    None,
                    quantity,
                    dec("5"),
                    dec("8"),
                );
                log.push((batch_id, quantity));
            }
            Op::Withdraw { batch_index, quantity } => {
                if let Some(batch_id) = pick(batch_index) {
                    if stock.withdraw(batch_id, quantity).is_ok() {
                        log.push((batch_id, -quantity));
                    }
                }
            }
            Op::Return { batch_index, quantity } => {
                if let Some(batch_id) = pick(batch_index) {
                    if stock.return_to_vendor(batch_id, quantity).is_ok() {
                        log.push((batch_id, -quantity));
                    }
                }
            }
            Op::Adjust { batch_index, delta } => {
                if delta != 0 {
                    if let Some(batch_id) = pick(batch_index) {
                        if stock.adjust(batch_id, delta).is_ok() {
                            log.push((batch_id, delta));
                        }
                    }
                }
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Conservation: every batch's quantity equals the sum of the
        /// movements logged against it, and the location total equals the
        /// sum of its batches
        #[test]
        fn prop_conservation(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut stock = LocationStock::default();
            let mut log: Vec<(BatchId, i64)> = Vec::new();

            for op in ops {
                apply(&mut stock, &mut log, op);
            }

            let mut per_batch: BTreeMap<BatchId, i64> = BTreeMap::new();
            for (batch_id, change) in &log {
                *per_batch.entry(*batch_id).or_default() += change;
            }
            for batch in stock.batches() {
                prop_assert_eq!(batch.quantity(), per_batch.get(&batch.id).copied().unwrap_or(0));
            }
            prop_assert!(conservation_holds(&stock));
        }

        /// No negative stock: no operation sequence ever drives any batch
        /// below zero
        #[test]
        fn prop_no_negative_stock(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut stock = LocationStock::default();
            let mut log = Vec::new();

            for op in ops {
                apply(&mut stock, &mut log, op);
                for batch in stock.batches() {
                    prop_assert!(batch.quantity() >= 0);
                }
                prop_assert!(stock.total_stock() >= 0);
            }
        }

        /// Returned quantity per batch never exceeds what was received into it
        #[test]
        fn prop_returns_bounded_by_receipts(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut stock = LocationStock::default();
            let mut log = Vec::new();

            for op in ops {
                apply(&mut stock, &mut log, op);
            }
            for batch in stock.batches() {
                prop_assert!(batch.returned_qty() >= 0);
                prop_assert!(batch.returned_qty() <= batch.received_qty());
            }
        }
    }
}
