pub mod content_controller;
pub mod health_controller;
pub mod search_controller;

pub use content_controller::ContentController;
pub use health_controller::HealthController;
pub use search_controller::SearchController;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::Metadata;

/// Parses a `--metadata` / `--filter` argument, which must be a JSON object.
pub(crate) fn parse_metadata(raw: Option<&str>) -> Result<Metadata> {
    let Some(raw) = raw else {
        return Ok(Metadata::new());
    };

    match serde_json::from_str::<Value>(raw).context("metadata is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("metadata must be a JSON object, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert!(parse_metadata(None).unwrap().is_empty());

        let parsed = parse_metadata(Some(r#"{"chapter": 2}"#)).unwrap();
        assert_eq!(parsed.get("chapter"), Some(&Value::from(2)));

        assert!(parse_metadata(Some("[1, 2]")).is_err());
        assert!(parse_metadata(Some("{not json")).is_err());
    }
}
