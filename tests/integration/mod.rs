//! Integration test modules for podfbv
//!
//! - translation: messages through the running pipeline
//! - lifecycle: open, reset, reconnect and stop behaviour of the supervisor

pub mod lifecycle;
pub mod translation;
