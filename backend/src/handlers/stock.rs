//! HTTP handlers for stock item endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use shared::{StockItem, StockItemId};

use crate::error::AppResult;
use crate::middleware::CurrentContext;
use crate::services::{
    AdjustStockInput, AuditEvent, CreateStockItemInput, RecordSaleInput, StockService,
};
use crate::AppState;

/// Create a stock item, optionally with opening stock
pub async fn create_stock_item(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Json(input): Json<CreateStockItemInput>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db.clone());
    let item = service.create_stock_item(&ctx, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "stock_item.created",
            item.id,
            format!("Stock item {} ({}) created", item.name, item.sku),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(item))
}

/// Get one stock item with its per-location batches
pub async fn get_stock_item(
    State(state): State<AppState>,
    _ctx: CurrentContext,
    Path(item_id): Path<StockItemId>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db);
    let item = service.get_stock_item(item_id).await?;
    Ok(Json(item))
}

/// List the catalog
pub async fn list_stock_items(
    State(state): State<AppState>,
    _ctx: CurrentContext,
) -> AppResult<Json<Vec<StockItem>>> {
    let service = StockService::new(state.db);
    let items = service.list_stock_items().await?;
    Ok(Json(items))
}

/// Apply a stocktake correction to one batch
pub async fn adjust_stock(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(item_id): Path<StockItemId>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<StockItem>> {
    let delta = input.delta;
    let service = StockService::new(state.db.clone());
    let item = service.adjust_stock(&ctx, item_id, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "stock.adjusted",
            item.id,
            format!("Stock of {} adjusted by {}", item.name, delta),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(item))
}

/// Record a point-of-sale withdrawal
pub async fn record_sale(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(item_id): Path<StockItemId>,
    Json(input): Json<RecordSaleInput>,
) -> AppResult<Json<StockItem>> {
    let quantity = input.quantity;
    let service = StockService::new(state.db.clone());
    let item = service.record_sale(&ctx, item_id, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "stock.sold",
            item.id,
            format!("Sold {} x {}", quantity, item.name),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(item))
}
