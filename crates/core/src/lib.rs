//! Core types for the scheduling analytics pipeline: error taxonomy, upstream
//! events and their decoding, the star-schema model, the store contract and
//! the aggregate query engine.

pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod query;
pub mod store;

pub use error::{Error, Result};
pub use events::{AnalyticsEvent, EventKind};
pub use memory::MemoryStore;
pub use model::*;
pub use query::{QueryConfig, QueryEngine};
pub use store::AnalyticsStore;
