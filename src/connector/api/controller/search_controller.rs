use anyhow::Result;

use crate::{CourseId, SearchQuery, SearchResult};

use super::super::Container;
use super::parse_metadata;

pub struct SearchController<'a> {
    container: &'a Container,
}

impl<'a> SearchController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn search(
        &self,
        course_id: CourseId,
        query: String,
        k: usize,
        filter: Option<String>,
        json: bool,
    ) -> Result<String> {
        let mut search_query = SearchQuery::new(query).with_limit(k);
        if filter.is_some() {
            search_query = search_query.with_filter(parse_metadata(filter.as_deref())?);
        }

        let results = self
            .container
            .vector_service()
            .search(course_id, &search_query)
            .await?;

        if json {
            Ok(serde_json::to_string_pretty(&results)?)
        } else {
            Ok(self.format_search_results(&results))
        }
    }

    fn format_search_results(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return "No results found.".to_string();
        }

        let mut output = format!("Found {} results:\n\n", results.len());

        for (i, result) in results.iter().enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, result.display_line()));

            let preview: String = result
                .text()
                .lines()
                .take(5)
                .map(|l| format!("   | {}", l))
                .collect::<Vec<_>>()
                .join("\n");
            output.push_str(&preview);
            output.push_str("\n\n");
        }

        output
    }
}
