use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coursecast::connector::adapter::http;
use coursecast::connector::api::{Container, ContainerConfig, Router};
use coursecast::{Commands, DistanceMetric};

#[derive(Parser)]
#[command(name = "coursecast")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        env = "COURSECAST_DATA_DIR",
        default_value = "~/.coursecast"
    )]
    data_dir: String,

    #[arg(long, global = true)]
    memory_storage: bool,

    #[arg(long, global = true)]
    mock_embeddings: bool,

    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    #[arg(long, global = true, default_value = "models/text-embedding-004")]
    embedding_model: String,

    /// cosine or l2
    #[arg(long, global = true, default_value = "cosine")]
    distance: String,

    /// Build an HNSW index per course table (loads the DuckDB vss extension)
    #[arg(long, global = true)]
    hnsw_index: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(distance) = DistanceMetric::parse(&cli.distance) else {
        bail!("Unknown distance '{}', expected cosine or l2", cli.distance);
    };

    let data_dir = expand_tilde(&cli.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let container = Container::new(ContainerConfig {
        data_dir,
        memory_storage: cli.memory_storage,
        mock_embeddings: cli.mock_embeddings,
        google_api_key: cli.google_api_key,
        embedding_model: cli.embedding_model,
        distance,
        hnsw_index: cli.hnsw_index,
    })
    .await?;

    match cli.command {
        Commands::Serve { bind, auth_timeout } => {
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("coursecast serving on {}", bind);
            let state = container
                .app_state()
                .with_auth_timeout(Duration::from_secs(auth_timeout));
            http::serve(listener, state).await?;
        }
        command => {
            let router = Router::new(&container);
            let output = router.route(command).await?;
            println!("{}", output);
        }
    }

    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            if path == "~" {
                return home.to_string_lossy().to_string();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
