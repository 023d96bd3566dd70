//! # Application Layer
//!
//! Ports to external collaborators (embedding provider, vector backend,
//! client channels) and the services coordinating them: the connection
//! registry, the course event notifier and the per-course vector service.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
