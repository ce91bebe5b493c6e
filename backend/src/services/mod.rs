//! Business logic services
//!
//! Services own the transactional write paths. Handlers construct them per
//! request around the shared pool, call one method, and publish the audit
//! event for whatever the service returned.

pub mod audit;
pub mod movements;
pub mod orders;
pub mod receiving;
pub mod returns;
pub mod sequences;
pub mod stock;
pub mod transfers;
pub mod tx;

pub use audit::{AuditEvent, AuditSink};
pub use movements::{MovementQuery, MovementService};
pub use orders::{CreateOrderInput, OrderService, RecordPaymentInput};
pub use receiving::{ReceiveInput, ReceivingService};
pub use returns::{CreateReturnInput, ReturnService};
pub use stock::{AdjustStockInput, CreateStockItemInput, RecordSaleInput, StockService};
pub use transfers::{CreateTransferInput, TransferService};
