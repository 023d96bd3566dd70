use anyhow::{bail, Result};

use crate::Commands;

use super::container::Container;
use super::controller::{ContentController, HealthController, SearchController};

pub struct Router<'a> {
    content_controller: ContentController<'a>,
    search_controller: SearchController<'a>,
    health_controller: HealthController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            content_controller: ContentController::new(container),
            search_controller: SearchController::new(container),
            health_controller: HealthController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Add {
                course_id,
                content_id,
                text,
                metadata,
            } => {
                self.content_controller
                    .add(course_id, content_id, text, metadata)
                    .await
            }
            Commands::Update {
                course_id,
                content_id,
                text,
                metadata,
            } => {
                self.content_controller
                    .update(course_id, content_id, text, metadata)
                    .await
            }
            Commands::Delete {
                course_id,
                content_id,
            } => self.content_controller.delete(course_id, content_id).await,
            Commands::Search {
                course_id,
                query,
                k,
                filter,
                json,
            } => {
                self.search_controller
                    .search(course_id, query, k, filter, json)
                    .await
            }
            Commands::Health => self.health_controller.health().await,
            Commands::Serve { .. } => bail!("serve runs the server loop and is handled in main"),
        }
    }
}
