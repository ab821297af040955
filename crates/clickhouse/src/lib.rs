//! ClickHouse backend for the analytics star schema.

pub mod client;
pub mod config;
pub mod rows;
pub mod schema;
pub mod store;

pub use client::*;
pub use config::*;
pub use store::ClickHouseStore;
