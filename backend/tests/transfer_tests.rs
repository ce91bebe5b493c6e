//! Inter-location transfer tests
//!
//! Covers the transfer round-trip property: moving quantity q from X to Y
//! and reversing restores X and empties Y's corresponding batch, with the
//! movement log summing to zero on both sides.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use shared::{DepositKind, LocationStock, StockError};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Debit the source batch and credit a matching batch at the destination,
/// the way the transfer processor replays a line
fn transfer(
    source: &mut LocationStock,
    destination: &mut LocationStock,
    batch_id: shared::BatchId,
    quantity: i64,
) -> Result<shared::BatchId, StockError> {
    let snapshot = source.withdraw(batch_id, quantity)?;
    Ok(destination.deposit(
        DepositKind::TransferIn,
        &snapshot.batch_number,
        snapshot.expiry_date,
        quantity,
        snapshot.cost_price,
        snapshot.sale_price,
    ))
}

/// Replay a transfer line in the opposite direction
fn reverse(
    source: &mut LocationStock,
    destination: &mut LocationStock,
    source_batch_id: shared::BatchId,
    destination_batch_id: shared::BatchId,
    quantity: i64,
) -> Result<(), StockError> {
    destination.withdraw(destination_batch_id, quantity)?;
    source.adjust(source_batch_id, quantity)?;
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Scenario: transfer 20 of B2 from L1 to L2, then reverse
    #[test]
    fn test_transfer_and_reverse_scenario() {
        let mut l1 = LocationStock::default();
        let mut l2 = LocationStock::default();
        let b2 = l1.deposit(DepositKind::Receipt, "B2", None, 40, dec("6"), dec("9"));

        let l2_batch = transfer(&mut l1, &mut l2, b2, 20).unwrap();
        assert_eq!(l1.batch(b2).unwrap().quantity(), 20);
        assert_eq!(l2.batch(l2_batch).unwrap().quantity(), 20);
        assert_eq!(l2.batch(l2_batch).unwrap().batch_number, "B2");
        // Destination batches are distinct records with their own ids
        assert_ne!(b2, l2_batch);

        reverse(&mut l1, &mut l2, b2, l2_batch, 20).unwrap();
        assert_eq!(l1.batch(b2).unwrap().quantity(), 40);
        assert_eq!(l2.batch(l2_batch).unwrap().quantity(), 0);
    }

    /// The destination batch carries the source's label and prices
    #[test]
    fn test_destination_batch_inherits_source_metadata() {
        let mut l1 = LocationStock::default();
        let mut l2 = LocationStock::default();
        let expiry = chrono::NaiveDate::from_ymd_opt(2025, 1, 31);
        let b1 = l1.deposit(DepositKind::Receipt, "LOT-7", expiry, 50, dec("5.50"), dec("8.25"));

        let l2_batch = transfer(&mut l1, &mut l2, b1, 30).unwrap();
        let batch = l2.batch(l2_batch).unwrap();
        assert_eq!(batch.batch_number, "LOT-7");
        assert_eq!(batch.expiry_date, expiry);
        assert_eq!(batch.cost_price, dec("5.50"));
        assert_eq!(batch.sale_price, dec("8.25"));
    }

    /// Transferred-in stock is never vendor-returnable at the destination
    #[test]
    fn test_transferred_stock_not_returnable_at_destination() {
        let mut l1 = LocationStock::default();
        let mut l2 = LocationStock::default();
        let b1 = l1.deposit(DepositKind::Receipt, "B1", None, 50, dec("5"), dec("8"));

        let l2_batch = transfer(&mut l1, &mut l2, b1, 30).unwrap();
        assert!(matches!(
            l2.return_to_vendor(l2_batch, 1),
            Err(StockError::ReturnExceedsReceipt { returnable: 0, .. })
        ));
    }

    /// Reversal fails if the destination already consumed the stock
    #[test]
    fn test_reversal_blocked_after_consumption() {
        let mut l1 = LocationStock::default();
        let mut l2 = LocationStock::default();
        let b1 = l1.deposit(DepositKind::Receipt, "B1", None, 50, dec("5"), dec("8"));

        let l2_batch = transfer(&mut l1, &mut l2, b1, 30).unwrap();
        l2.withdraw(l2_batch, 5).unwrap();

        let err = reverse(&mut l1, &mut l2, b1, l2_batch, 30).unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { .. }));
    }

    /// Transferring more than the source batch holds fails cleanly
    #[test]
    fn test_transfer_overdraw_rejected() {
        let mut l1 = LocationStock::default();
        let mut l2 = LocationStock::default();
        let b1 = l1.deposit(DepositKind::Receipt, "B1", None, 10, dec("5"), dec("8"));

        let err = transfer(&mut l1, &mut l2, b1, 11).unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { .. }));
        assert_eq!(l1.total_stock(), 10);
        assert_eq!(l2.total_stock(), 0);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Transfer round-trip restores the source and empties the
        /// destination for any starting quantity and transfer size
        #[test]
        fn prop_transfer_round_trip(
            initial in 1i64..1000,
            moved in 1i64..1000,
        ) {
            prop_assume!(moved <= initial);
            let mut source = LocationStock::default();
            let mut destination = LocationStock::default();
            let batch_id = source.deposit(DepositKind::Receipt, "B1", None, initial, dec("5"), dec("8"));

            let destination_batch_id = transfer(&mut source, &mut destination, batch_id, moved).unwrap();
            prop_assert_eq!(source.total_stock(), initial - moved);
            prop_assert_eq!(destination.total_stock(), moved);

            reverse(&mut source, &mut destination, batch_id, destination_batch_id, moved).unwrap();
            prop_assert_eq!(source.batch(batch_id).unwrap().quantity(), initial);
            prop_assert_eq!(destination.batch(destination_batch_id).unwrap().quantity(), 0);
        }

        /// Stock is conserved across locations through any transfer chain
        #[test]
        fn prop_transfers_conserve_total(
            initial in 1i64..1000,
            hops in prop::collection::vec(1i64..100, 1..8)
        ) {
            let mut source = LocationStock::default();
            let mut destination = LocationStock::default();
            let batch_id = source.deposit(DepositKind::Receipt, "B1", None, initial, dec("5"), dec("8"));

            for quantity in hops {
                // Overdraws fail without moving anything
                let _ = transfer(&mut source, &mut destination, batch_id, quantity);
                prop_assert_eq!(source.total_stock() + destination.total_stock(), initial);
            }
        }
    }
}
