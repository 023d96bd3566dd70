use std::fmt;

use serde::{Deserialize, Serialize};

pub type CourseId = i64;
pub type ChapterId = i64;

const NAMESPACE_PREFIX: &str = "vector_collection_course_";

/// Name of the backing table/collection holding one course's vector records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    /// Deterministic namespace for a course. The same id always maps to the same name.
    pub fn for_course(course_id: CourseId) -> Self {
        Self(format!("{}{}", NAMESPACE_PREFIX, course_id))
    }

    /// Recovers the course id from a namespace name produced by [`Namespace::for_course`].
    pub fn course_id(&self) -> Option<CourseId> {
        self.0.strip_prefix(NAMESPACE_PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
