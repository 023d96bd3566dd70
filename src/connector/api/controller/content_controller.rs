use anyhow::Result;

use crate::CourseId;

use super::super::Container;
use super::parse_metadata;

pub struct ContentController<'a> {
    container: &'a Container,
}

impl<'a> ContentController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn add(
        &self,
        course_id: CourseId,
        content_id: String,
        text: String,
        metadata: Option<String>,
    ) -> Result<String> {
        let metadata = parse_metadata(metadata.as_deref())?;
        let service = self.container.vector_service();
        service.add(course_id, &content_id, &text, metadata).await?;

        Ok(format!(
            "Added {} to {}",
            content_id,
            service.namespace_for(course_id)
        ))
    }

    pub async fn update(
        &self,
        course_id: CourseId,
        content_id: String,
        text: String,
        metadata: Option<String>,
    ) -> Result<String> {
        let metadata = parse_metadata(metadata.as_deref())?;
        let service = self.container.vector_service();
        service
            .update(course_id, &content_id, &text, metadata)
            .await?;

        Ok(format!(
            "Updated {} in {}",
            content_id,
            service.namespace_for(course_id)
        ))
    }

    pub async fn delete(&self, course_id: CourseId, content_id: String) -> Result<String> {
        let removed = self
            .container
            .vector_service()
            .delete(course_id, &content_id)
            .await?;

        if removed {
            Ok(format!("Deleted {} from course {}.", content_id, course_id))
        } else {
            Ok(format!("No content {} in course {}.", content_id, course_id))
        }
    }
}
