//! HTTP handlers for inter-location transfer endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use shared::{StockTransfer, TransferId};

use crate::error::AppResult;
use crate::middleware::CurrentContext;
use crate::services::{AuditEvent, CreateTransferInput, TransferService};
use crate::AppState;

/// Move stock between two locations
pub async fn create_transfer(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<Json<StockTransfer>> {
    let service = TransferService::new(state.db.clone());
    let transfer = service.create_transfer(&ctx, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "transfer.created",
            transfer.id,
            format!(
                "Transfer {} from {} to {}",
                transfer.transfer_number, transfer.from_location_id, transfer.to_location_id
            ),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(transfer))
}

/// Reverse a completed transfer
pub async fn reverse_transfer(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(transfer_id): Path<TransferId>,
) -> AppResult<Json<StockTransfer>> {
    let service = TransferService::new(state.db.clone());
    let transfer = service.reverse_transfer(&ctx, transfer_id).await?;
    state.audit.publish(
        AuditEvent::new(
            "transfer.reversed",
            transfer.id,
            format!("Transfer {} reversed", transfer.transfer_number),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(transfer))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    _ctx: CurrentContext,
    Path(transfer_id): Path<TransferId>,
) -> AppResult<Json<StockTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service.get_transfer(transfer_id).await?;
    Ok(Json(transfer))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    _ctx: CurrentContext,
) -> AppResult<Json<Vec<StockTransfer>>> {
    let service = TransferService::new(state.db);
    let transfers = service.list_transfers().await?;
    Ok(Json(transfers))
}
