//! HTTP middleware for the Stockroom platform

pub mod auth;

pub use auth::{context_middleware, CurrentContext, RequestContext};
