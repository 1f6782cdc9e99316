//! Store-of-record contracts and the in-memory implementation.

pub mod memory_store;
pub mod projection_store;
