mod course;
mod embedding;
mod event;
mod search_result;
mod vector_record;

pub use course::*;
pub use embedding::*;
pub use event::*;
pub use search_result::*;
pub use vector_record::*;
