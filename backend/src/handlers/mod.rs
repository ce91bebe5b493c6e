//! HTTP handlers

pub mod health;
pub mod movements;
pub mod orders;
pub mod returns;
pub mod stock;
pub mod transfers;

pub use health::health_check;
pub use movements::get_movement_history;
pub use orders::{
    cancel_order, create_order, delete_order, get_order, list_orders, receive_order_items,
    record_payment,
};
pub use returns::{create_return, get_return, list_returns};
pub use stock::{adjust_stock, create_stock_item, get_stock_item, list_stock_items, record_sale};
pub use transfers::{create_transfer, get_transfer, list_transfers, reverse_transfer};
