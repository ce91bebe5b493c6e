//! Domain models for the Stockroom platform

mod movement;
mod order;
mod returns;
mod stock;
mod transfer;

pub use movement::*;
pub use order::*;
pub use returns::*;
pub use stock::*;
pub use transfer::*;
