//! Ingestion workers for the analytics pipeline.
//!
//! - Denormalizer (typed events → store upserts and deletes)
//! - Router (subject → event kind → denormalizer)
//! - Topic consumers (fetch, route, ack or nak)
//! - Supervisor (one consumer per topic group, shared shutdown)

pub mod consumer;
pub mod denormalize;
pub mod router;
pub mod supervisor;

pub use consumer::{ConsumerSettings, TopicConsumer, WorkerProgress};
pub use denormalize::{Clock, Denormalizer, ManualClock, SystemClock};
pub use router::{Disposition, EventRouter};
pub use supervisor::*;
