mod duckdb_vector_store;
mod gemini_embedding;
pub mod http;
mod in_memory_vector_store;
mod mock_embedding;
mod ws_channel;

pub use duckdb_vector_store::*;
pub use gemini_embedding::*;
pub use in_memory_vector_store::*;
pub use mock_embedding::*;
pub use ws_channel::*;
