use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the WebSocket notification server and internal HTTP API
    Serve {
        #[arg(long, env = "COURSECAST_BIND", default_value = "127.0.0.1:8127")]
        bind: String,

        /// Seconds a new socket may take to send its auth message
        #[arg(long, default_value = "10")]
        auth_timeout: u64,
    },

    /// Embed and store a piece of course content
    Add {
        /// Course whose namespace receives the content
        course_id: i64,

        /// Identifier of the content within the course
        content_id: String,

        /// Text to embed and store
        text: String,

        /// JSON object stored alongside the content
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Find the stored content closest to a query
    Search {
        /// Course to search in
        course_id: i64,

        /// Text to embed and match against stored content
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// JSON object; every key must match the stored metadata exactly
        #[arg(short, long)]
        filter: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a piece of content from a course
    Delete {
        /// Course the content belongs to
        course_id: i64,

        /// Identifier of the content to remove
        content_id: String,
    },

    /// Replace stored content, restoring the previous version if the write fails
    Update {
        /// Course the content belongs to
        course_id: i64,

        /// Identifier of the content to replace
        content_id: String,

        /// New text to embed and store
        text: String,

        /// JSON object stored alongside the content
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Check that the vector store and the embedding provider respond
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[derive(Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_every_subcommand_and_positional_is_documented() {
        let cli = Cli::command();
        for sub in cli.get_subcommands() {
            assert!(sub.get_about().is_some(), "{} has no help text", sub.get_name());
            for arg in sub.get_positionals() {
                assert!(
                    arg.get_help().is_some(),
                    "{} {} has no help text",
                    sub.get_name(),
                    arg.get_id()
                );
            }
        }
    }

    #[test]
    fn test_search_parses_limit_and_json_flag() {
        let cli = Cli::try_parse_from(["coursecast", "search", "3", "graphs", "-k", "2", "--json"])
            .unwrap();
        match cli.command {
            Commands::Search { course_id, k, json, .. } => {
                assert_eq!(course_id, 3);
                assert_eq!(k, 2);
                assert!(json);
            }
            _ => panic!("expected search"),
        }
    }
}
