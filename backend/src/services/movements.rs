use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{LocationId, MovementType, StockItemId, StockMovement};

use crate::error::{AppError, AppResult};

#[derive(sqlx::FromRow)]
pub(crate) struct MovementRow {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    pub location_id: Uuid,
    pub batch_id: Uuid,
    pub batch_number: String,
    pub movement_type: String,
    pub quantity_change: i64,
    pub cost: Option<Decimal>,
    pub related_order_id: Option<Uuid>,
    pub related_return_id: Option<Uuid>,
    pub related_transfer_id: Option<Uuid>,
    pub reason: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub moved_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::parse(&row.movement_type).ok_or_else(|| {
            AppError::Internal(format!("unknown movement type '{}'", row.movement_type))
        })?;
        Ok(StockMovement {
            id: row.id,
            stock_item_id: row.stock_item_id.into(),
            location_id: row.location_id.into(),
            batch_id: row.batch_id.into(),
            batch_number: row.batch_number,
            movement_type,
            quantity_change: row.quantity_change,
            cost: row.cost,
            related_order_id: row.related_order_id.map(Into::into),
            related_return_id: row.related_return_id.map(Into::into),
            related_transfer_id: row.related_transfer_id.map(Into::into),
            reason: row.reason,
            recorded_by: row.recorded_by,
            moved_at: row.moved_at,
        })
    }
}

/// Append a ledger entry inside the transaction that mutated the stock it
/// describes. Rows are insert-only; nothing in the codebase updates or
/// deletes them.
pub(crate) async fn append_movement(
    tx: &mut Transaction<'_, Postgres>,
    movement: &StockMovement,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements
            (id, stock_item_id, location_id, batch_id, batch_number, movement_type,
             quantity_change, cost, related_order_id, related_return_id,
             related_transfer_id, reason, recorded_by, moved_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(movement.id)
    .bind(movement.stock_item_id.0)
    .bind(movement.location_id.0)
    .bind(movement.batch_id.0)
    .bind(&movement.batch_number)
    .bind(movement.movement_type.as_str())
    .bind(movement.quantity_change)
    .bind(movement.cost)
    .bind(movement.related_order_id.map(|id| id.0))
    .bind(movement.related_return_id.map(|id| id.0))
    .bind(movement.related_transfer_id.map(|id| id.0))
    .bind(&movement.reason)
    .bind(movement.recorded_by)
    .bind(movement.moved_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Optional narrowing of a movement history query
#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub related_order_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
}

impl MovementService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Movement history for one item at one location, newest first
    pub async fn history(
        &self,
        item_id: StockItemId,
        location_id: LocationId,
        query: &MovementQuery,
    ) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, stock_item_id, location_id, batch_id, batch_number,
                   movement_type, quantity_change, cost, related_order_id,
                   related_return_id, related_transfer_id, reason, recorded_by, moved_at
            FROM stock_movements
            WHERE stock_item_id = $1
              AND location_id = $2
              AND ($3::date IS NULL OR moved_at::date >= $3)
              AND ($4::date IS NULL OR moved_at::date <= $4)
              AND ($5::uuid IS NULL OR related_order_id = $5)
            ORDER BY moved_at DESC, id DESC
            "#,
        )
        .bind(item_id.0)
        .bind(location_id.0)
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(query.related_order_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockMovement::try_from).collect()
    }
}
