//! # Domain Layer
//!
//! Course, vector record and event envelope models plus the error taxonomy.
//! This layer is independent of transports and storage backends.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
