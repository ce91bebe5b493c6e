//! HTTP handlers for purchase order endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use shared::{OrderId, StockOrder};

use crate::error::AppResult;
use crate::middleware::CurrentContext;
use crate::services::{
    AuditEvent, CreateOrderInput, OrderService, ReceiveInput, ReceivingService, RecordPaymentInput,
};
use crate::AppState;

/// Create a pending purchase order
pub async fn create_order(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<Json<StockOrder>> {
    let service = OrderService::new(state.db.clone());
    let order = service.create_order(&ctx, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "order.created",
            order.id,
            format!("Order {} created for {}", order.order_number, order.vendor),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(order))
}

pub async fn get_order(
    State(state): State<AppState>,
    _ctx: CurrentContext,
    Path(order_id): Path<OrderId>,
) -> AppResult<Json<StockOrder>> {
    let service = OrderService::new(state.db);
    let order = service.get_order(order_id).await?;
    Ok(Json(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    _ctx: CurrentContext,
) -> AppResult<Json<Vec<StockOrder>>> {
    let service = OrderService::new(state.db);
    let orders = service.list_orders().await?;
    Ok(Json(orders))
}

/// Receive deliveries against an order
pub async fn receive_order_items(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(order_id): Path<OrderId>,
    Json(input): Json<ReceiveInput>,
) -> AppResult<Json<StockOrder>> {
    let service = ReceivingService::new(state.db.clone());
    let order = service.receive_order_items(&ctx, order_id, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "order.received",
            order.id,
            format!(
                "Deliveries received against order {}, now {}",
                order.order_number,
                order.status.as_str()
            ),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(order))
}

/// Cancel a pending order
pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(order_id): Path<OrderId>,
) -> AppResult<Json<StockOrder>> {
    let service = OrderService::new(state.db.clone());
    let order = service.cancel_order(order_id).await?;
    state.audit.publish(
        AuditEvent::new(
            "order.cancelled",
            order.id,
            format!("Order {} cancelled", order.order_number),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(order))
}

/// Delete a pending or cancelled order
pub async fn delete_order(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(order_id): Path<OrderId>,
) -> AppResult<Json<()>> {
    let service = OrderService::new(state.db.clone());
    service.delete_order(order_id).await?;
    state.audit.publish(
        AuditEvent::new("order.deleted", order_id, "Order deleted").by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(()))
}

/// Record a payment against an order
pub async fn record_payment(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(order_id): Path<OrderId>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<Json<StockOrder>> {
    let service = OrderService::new(state.db.clone());
    let order = service.record_payment(order_id, input).await?;
    state.audit.publish(
        AuditEvent::new(
            "order.payment_recorded",
            order.id,
            format!(
                "Payment recorded against order {}, {} paid to date",
                order.order_number, order.amount_paid
            ),
        )
        .by(ctx.user_id, &ctx.user_name),
    );
    Ok(Json(order))
}
