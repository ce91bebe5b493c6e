//! HTTP handlers for movement ledger queries

use axum::{
    extract::{Path, Query, State},
    Json,
};

use shared::{LocationId, StockItemId, StockMovement};

use crate::error::AppResult;
use crate::middleware::CurrentContext;
use crate::services::{MovementQuery, MovementService};
use crate::AppState;

/// Movement history for one item at one location, newest first.
/// Supports `start_date`, `end_date` and `related_order_id` query filters.
pub async fn get_movement_history(
    State(state): State<AppState>,
    _ctx: CurrentContext,
    Path((item_id, location_id)): Path<(StockItemId, LocationId)>,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = MovementService::new(state.db);
    let movements = service.history(item_id, location_id, &query).await?;
    Ok(Json(movements))
}
