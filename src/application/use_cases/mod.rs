mod connection_registry;
mod course_notifier;
mod course_vectors;

pub use connection_registry::*;
pub use course_notifier::*;
pub use course_vectors::*;
