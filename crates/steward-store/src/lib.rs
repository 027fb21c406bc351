//! Steward Store - In-memory content repository for tests and offline runs

pub mod memory;
pub mod snapshot;

pub use memory::{InMemoryContentRepository, TransportEntry};
pub use snapshot::{ContentSnapshot, RepositorySnapshot};
