//! Human-readable document ids, e.g. "PO-2024-0007"
//!
//! Numbers come from a per-prefix, per-year counter advanced atomically by
//! the `next_document_sequence` database function, so two concurrent
//! creators can never be handed the same number. Attempts that later roll
//! back leave a gap in the sequence, which is acceptable for display ids.

use sqlx::PgPool;

use crate::error::AppResult;

/// Allocate the next display id for `prefix` in `year`
pub(crate) async fn next_document_number(
    db: &PgPool,
    prefix: &str,
    year: i32,
) -> AppResult<String> {
    let sequence: i64 = sqlx::query_scalar("SELECT next_document_sequence($1, $2)")
        .bind(prefix)
        .bind(year)
        .fetch_one(db)
        .await?;
    Ok(format_document_number(prefix, year, sequence))
}

pub(crate) fn format_document_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, year, sequence)
}

#[cfg(test)]
mod tests {
    use super::format_document_number;

    #[test]
    fn document_numbers_are_zero_padded_per_year() {
        assert_eq!(format_document_number("PO", 2024, 7), "PO-2024-0007");
        assert_eq!(format_document_number("RET", 2024, 3), "RET-2024-0003");
        assert_eq!(format_document_number("TRF", 2025, 12), "TRF-2025-0012");
    }

    #[test]
    fn document_numbers_widen_past_four_digits() {
        assert_eq!(format_document_number("PO", 2024, 10001), "PO-2024-10001");
    }
}
