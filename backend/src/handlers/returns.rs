//! HTTP handlers for vendor return endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use shared::{ReturnId, StockReturn};

use crate::error::AppResult;
use crate::middleware::CurrentContext;
use crate::services::{AuditEvent, CreateReturnInput, ReturnService};
use crate::AppState;

/// Return stock to a vendor against a received order
pub async fn create_return(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Json(input): Json<CreateReturnInput>,
) -> AppResult<Json<StockReturn>> {
    let service = ReturnService::new(state.db.clone());
    let stock_return = service.create_return(&ctx, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "return.created",
            stock_return.id,
            format!(
                "Return {} to {} worth {}",
                stock_return.return_number, stock_return.vendor, stock_return.total_return_value
            ),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(stock_return))
}

pub async fn get_return(
    State(state): State<AppState>,
    _ctx: CurrentContext,
    Path(return_id): Path<ReturnId>,
) -> AppResult<Json<StockReturn>> {
    let service = ReturnService::new(state.db);
    let stock_return = service.get_return(return_id).await?;
    Ok(Json(stock_return))
}

pub async fn list_returns(
    State(state): State<AppState>,
    _ctx: CurrentContext,
) -> AppResult<Json<Vec<StockReturn>>> {
    let service = ReturnService::new(state.db);
    let returns = service.list_returns().await?;
    Ok(Json(returns))
}
