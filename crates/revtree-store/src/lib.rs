//! The backing object-store boundary of the revision-tree engine.
//!
//! The tree builder reads original trees from, and flushes newly built
//! trees to, an [`ObjectStore`]. The store owns all durable immutable data
//! and is never mutated by reads. This crate defines the trait, an
//! in-memory implementation for tests and embedding, and a call-recording
//! wrapper used to verify subtree-reuse behavior.

pub mod error;
pub mod memory;
pub mod recording;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use recording::RecordingObjectStore;
pub use traits::ObjectStore;
