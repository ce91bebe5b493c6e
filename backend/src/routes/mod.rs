//! Route definitions for the Stockroom API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::context_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - stock catalog and direct stock mutations
        .nest("/items", item_routes())
        // Protected routes - purchase orders and receiving
        .nest("/orders", order_routes())
        // Protected routes - vendor returns
        .nest("/returns", return_routes())
        // Protected routes - inter-location transfers
        .nest("/transfers", transfer_routes())
}

/// Stock item routes (protected)
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock_items).post(handlers::create_stock_item))
        .route("/:item_id", get(handlers::get_stock_item))
        .route("/:item_id/adjustments", post(handlers::adjust_stock))
        .route("/:item_id/sales", post(handlers::record_sale))
        .route(
            "/:item_id/locations/:location_id/movements",
            get(handlers::get_movement_history),
        )
        .route_layer(middleware::from_fn(context_middleware))
}

/// Purchase order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route(
            "/:order_id",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        .route("/:order_id/receipts", post(handlers::receive_order_items))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route("/:order_id/payments", post(handlers::record_payment))
        .route_layer(middleware::from_fn(context_middleware))
}

/// Vendor return routes (protected)
fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_returns).post(handlers::create_return))
        .route("/:return_id", get(handlers::get_return))
        .route_layer(middleware::from_fn(context_middleware))
}

/// Transfer routes (protected)
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers).post(handlers::create_transfer))
        .route("/:transfer_id", get(handlers::get_transfer))
        .route("/:transfer_id/reverse", post(handlers::reverse_transfer))
        .route_layer(middleware::from_fn(context_middleware))
}
