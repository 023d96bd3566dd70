//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Embedding generation (Gemini REST API, deterministic mock)
//! - Vector storage (DuckDB tables per course, in-memory)
//! - Transport (axum HTTP API and WebSocket channels)
//! - API wiring for the CLI (container, router, controllers)

pub mod adapter;
pub mod api;

pub use adapter::*;
