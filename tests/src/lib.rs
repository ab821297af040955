//! Shared support for the workspace integration tests.

pub mod containers;
pub mod fixtures;
pub mod mocks;
