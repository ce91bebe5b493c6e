//! Validation utilities for the Stockroom platform
//!
//! Pure checks on quantities, prices and identifiers; services turn these
//! into structured errors before any state is touched.

use rust_decimal::Decimal;

use crate::types::LocationId;

// ============================================================================
// Quantity and price validations
// ============================================================================

/// Quantities on orders, deliveries, returns and transfers must be positive
pub fn validate_positive_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Adjustment deltas may be negative but never zero
pub fn validate_nonzero_delta(delta: i64) -> Result<(), &'static str> {
    if delta == 0 {
        return Err("Adjustment delta must not be zero");
    }
    Ok(())
}

/// Prices are non-negative; zero is legal (free samples, written-off cost)
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Identifier validations
// ============================================================================

/// Validate SKU format (2-32 chars, uppercase alphanumeric plus dash)
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.len() < 2 {
        return Err("SKU must be at least 2 characters");
    }
    if sku.len() > 32 {
        return Err("SKU must be at most 32 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("SKU must be uppercase alphanumeric with dashes");
    }
    Ok(())
}

/// Batch labels are free-form but bounded; empty is allowed
pub fn validate_batch_number(batch_number: &str) -> Result<(), &'static str> {
    if batch_number.len() > 64 {
        return Err("Batch number must be at most 64 characters");
    }
    Ok(())
}

// ============================================================================
// Cross-field validations
// ============================================================================

/// Orders, returns and transfers must carry at least one line
pub fn validate_non_empty_lines<T>(lines: &[T]) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("At least one line item is required");
    }
    Ok(())
}

/// A transfer must move stock between two different locations
pub fn validate_distinct_locations(
    from: LocationId,
    to: LocationId,
) -> Result<(), &'static str> {
    if from == to {
        return Err("Source and destination locations must differ");
    }
    Ok(())
}
