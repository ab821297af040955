//! Redpanda pull subscriptions for the analytics pipeline.

pub mod config;
pub mod consumer;
pub mod delivery;
pub mod health;
pub mod topics;

pub use config::*;
pub use consumer::*;
pub use delivery::*;
pub use topics::*;
