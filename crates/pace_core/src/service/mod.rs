//! Use-case orchestration above the store and validation layers.

pub mod draft_service;
pub mod error;
pub mod projection_service;
