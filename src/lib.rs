//! swapflow - Core Library
//! Concurrent swap routing and execution with live order status streaming

// Public modules
pub mod core;
pub mod sources;
pub mod router;
pub mod execution;
pub mod engine;
pub mod status;
pub mod adapters;
pub mod queue;
pub mod service;

// Re-exports
pub use crate::core::{Config, Error, Result};
